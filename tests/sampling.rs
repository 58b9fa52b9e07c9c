//! End-to-end tests for the sampling subprotocol: server-initiated
//! `sampling/createMessage` exchanges answered by the client's resolver while
//! the rest of the connection keeps flowing.

use async_trait::async_trait;
use mcp_duplex::schema::{FieldKind, InputSchema};
use mcp_duplex::transport::NdjsonTransport;
use mcp_duplex::types::{CallToolResult, CreateMessageParams, CreateMessageResult};
use mcp_duplex::{Client, Error, Result, SamplingResolver, Server, SessionHandle};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// A server whose `confirm_delete` tool asks the client before "acting".
/// Only `Y` deletes; any other answer, including one that is neither Y nor N,
/// cancels.
fn confirm_server() -> Server {
    Server::new("confirm-server")
        .register_tool(
            "confirm_delete",
            "Deletes a path after asking for confirmation",
            InputSchema::new().required("path", FieldKind::String, "Path to delete"),
            confirm_delete,
        )
        .unwrap()
        .register_tool(
            "echo",
            "Echoes its input back",
            InputSchema::new().required("text", FieldKind::String, "Text to echo"),
            |_handle, args: Value| async move {
                Ok(CallToolResult::text(
                    args["text"].as_str().unwrap_or_default(),
                ))
            },
        )
        .unwrap()
}

async fn confirm_delete(handle: SessionHandle, args: Value) -> Result<CallToolResult> {
    let path = args["path"].as_str().unwrap_or_default().to_string();
    let resolution = handle
        .create_message(
            vec![mcp_duplex::types::SamplingMessage::user(format!(
                "confirm delete {}? (Y/N): ",
                path
            ))],
            100,
        )
        .await?;
    let answer = resolution.text().unwrap_or_default().trim().to_uppercase();
    if answer == "Y" {
        Ok(CallToolResult::text("deleted"))
    } else {
        Ok(CallToolResult::text("cancelled"))
    }
}

// Capture session logs when a test fails; repeat calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

async fn setup_test_server(server: Server) -> (String, JoinHandle<()>) {
    init_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let addr_clone = server_addr.clone();
    let server_handle = tokio::spawn(async move {
        let _ = server.tcp_listen::<NdjsonTransport>(&addr_clone).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (server_addr, server_handle)
}

/// Resolves every prompt with a fixed answer, recording the prompts it saw.
struct FixedResolver {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl FixedResolver {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SamplingResolver for FixedResolver {
    async fn resolve(&self, params: CreateMessageParams) -> Result<CreateMessageResult> {
        let prompt = params.messages[0].content.as_text().unwrap_or("").to_string();
        self.prompts.lock().unwrap().push(prompt);
        Ok(CreateMessageResult::user_text(self.answer.clone()))
    }
}

/// Holds every answer until the test releases the gate.
struct GatedResolver {
    gate: Arc<Notify>,
    answer: String,
}

#[async_trait]
impl SamplingResolver for GatedResolver {
    async fn resolve(&self, _params: CreateMessageParams) -> Result<CreateMessageResult> {
        self.gate.notified().await;
        Ok(CreateMessageResult::user_text(self.answer.clone()))
    }
}

async fn connect_with(addr: &str, resolver: Arc<dyn SamplingResolver>) -> Client {
    let transport = NdjsonTransport::connect(addr).await.unwrap();
    Client::connect_with_resolver(transport, resolver).await.unwrap()
}

#[tokio::test]
async fn test_confirm_delete_yes_deletes() {
    let test_body = async {
        let (addr, _server_handle) = setup_test_server(confirm_server()).await;
        let resolver = Arc::new(FixedResolver::new("Y"));
        let client = connect_with(&addr, resolver.clone()).await;

        let result = client
            .call_tool("confirm_delete", json!({ "path": "/tmp/a.txt" }))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content[0].as_text(), Some("deleted"));

        let prompts = resolver.prompts.lock().unwrap();
        assert_eq!(prompts.as_slice(), ["confirm delete /tmp/a.txt? (Y/N): "]);
    };

    tokio::time::timeout(Duration::from_secs(6), test_body)
        .await
        .expect("Test timed out after 6 seconds");
}

#[tokio::test]
async fn test_confirm_delete_no_cancels() {
    let test_body = async {
        let (addr, _server_handle) = setup_test_server(confirm_server()).await;
        let client = connect_with(&addr, Arc::new(FixedResolver::new("N"))).await;

        let result = client
            .call_tool("confirm_delete", json!({ "path": "/tmp/a.txt" }))
            .await
            .unwrap();
        assert_eq!(result.content[0].as_text(), Some("cancelled"));
    };

    tokio::time::timeout(Duration::from_secs(6), test_body)
        .await
        .expect("Test timed out after 6 seconds");
}

#[tokio::test]
async fn test_confirm_delete_garbled_answer_cancels() {
    // An answer that is neither Y nor N takes the defensive default and
    // cancels. TBD whether a reprompt would serve users better; the wire
    // behavior under test here is only that nothing gets deleted.
    let test_body = async {
        let (addr, _server_handle) = setup_test_server(confirm_server()).await;
        let client = connect_with(&addr, Arc::new(FixedResolver::new("maybe?"))).await;

        let result = client
            .call_tool("confirm_delete", json!({ "path": "/tmp/a.txt" }))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content[0].as_text(), Some("cancelled"));
    };

    tokio::time::timeout(Duration::from_secs(6), test_body)
        .await
        .expect("Test timed out after 6 seconds");
}

#[tokio::test]
async fn test_sampling_suspends_only_the_issuing_handler() {
    let test_body = async {
        let (addr, _server_handle) = setup_test_server(confirm_server()).await;
        let gate = Arc::new(Notify::new());
        let resolver = Arc::new(GatedResolver {
            gate: Arc::clone(&gate),
            answer: "Y".to_string(),
        });
        let client = Arc::new(connect_with(&addr, resolver).await);

        // First call suspends inside the gated sampling exchange.
        let confirm_client = Arc::clone(&client);
        let confirm_task = tokio::spawn(async move {
            confirm_client
                .call_tool("confirm_delete", json!({ "path": "/tmp/a.txt" }))
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!confirm_task.is_finished());

        // An independent call overtakes it while it is suspended.
        let result = client.call_tool("echo", json!({ "text": "overtaken" })).await.unwrap();
        assert_eq!(result.content[0].as_text(), Some("overtaken"));
        assert!(!confirm_task.is_finished());

        // Release the gate; the suspended handler now completes.
        gate.notify_one();
        let result = confirm_task.await.unwrap().unwrap();
        assert_eq!(result.content[0].as_text(), Some("deleted"));
    };

    tokio::time::timeout(Duration::from_secs(6), test_body)
        .await
        .expect("Test timed out after 6 seconds");
}

#[tokio::test]
async fn test_client_without_resolver_fails_the_tool_not_the_connection() {
    let test_body = async {
        let (addr, _server_handle) = setup_test_server(confirm_server()).await;
        let transport = NdjsonTransport::connect(&addr).await.unwrap();
        let client = Client::connect(transport).await.unwrap();

        let result = client
            .call_tool("confirm_delete", json!({ "path": "/tmp/a.txt" }))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content[0]
            .as_text()
            .unwrap()
            .contains("no sampling resolver registered"));

        // The session survives the failed exchange.
        assert!(client.is_ready());
        assert_eq!(client.list_tools().await.unwrap().len(), 2);
    };

    tokio::time::timeout(Duration::from_secs(6), test_body)
        .await
        .expect("Test timed out after 6 seconds");
}

#[tokio::test]
async fn test_sampling_timeout_fails_the_handler() {
    let test_body = async {
        let server = confirm_server().sampling_timeout(Duration::from_millis(100));
        let (addr, _server_handle) = setup_test_server(server).await;
        // The gate is never released, so the server-side deadline fires.
        let resolver = Arc::new(GatedResolver {
            gate: Arc::new(Notify::new()),
            answer: "Y".to_string(),
        });
        let client = connect_with(&addr, resolver).await;

        let result = client
            .call_tool("confirm_delete", json!({ "path": "/tmp/a.txt" }))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content[0].as_text().unwrap().contains("timed out"));
        assert!(client.is_ready());
    };

    tokio::time::timeout(Duration::from_secs(6), test_body)
        .await
        .expect("Test timed out after 6 seconds");
}

#[tokio::test]
async fn test_disconnect_interrupts_pending_sampling_exactly_once() {
    let test_body = async {
        // Record what the suspended handler observes when the client vanishes.
        let outcomes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let outcomes_clone = Arc::clone(&outcomes);
        let server = Server::new("interrupt-server")
            .register_tool(
                "confirm_delete",
                "Deletes a path after asking for confirmation",
                InputSchema::new().required("path", FieldKind::String, "Path to delete"),
                move |handle: SessionHandle, _args| {
                    let outcomes = Arc::clone(&outcomes_clone);
                    async move {
                        let outcome = handle
                            .create_message(
                                vec![mcp_duplex::types::SamplingMessage::user("confirm? ")],
                                100,
                            )
                            .await;
                        let label = match &outcome {
                            Ok(_) => "resolved".to_string(),
                            Err(Error::SamplingInterrupted) => "interrupted".to_string(),
                            Err(e) => format!("other: {}", e),
                        };
                        outcomes.lock().unwrap().push(label);
                        outcome.map(|_| CallToolResult::text("deleted"))
                    }
                },
            )
            .unwrap();
        let (addr, _server_handle) = setup_test_server(server).await;

        let resolver = Arc::new(GatedResolver {
            gate: Arc::new(Notify::new()),
            answer: "Y".to_string(),
        });
        let client = Arc::new(connect_with(&addr, resolver).await);

        let call_client = Arc::clone(&client);
        let call_task = tokio::spawn(async move {
            call_client
                .call_tool("confirm_delete", json!({ "path": "/tmp/a.txt" }))
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Abort the call and drop the client mid-exchange; the TCP stream
        // closes under the server's feet.
        call_task.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(client);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let observed = outcomes.lock().unwrap().clone();
        assert_eq!(observed, vec!["interrupted".to_string()]);
    };

    tokio::time::timeout(Duration::from_secs(6), test_body)
        .await
        .expect("Test timed out after 6 seconds");
}
