use std::process::{Command, Stdio};
use std::io::{Write, BufRead, BufReader};
use std::sync::mpsc::{channel, Sender, Receiver};
use std::thread;
use std::time::Duration;
use serde_json::{json, Value};

/// Helper struct to manage server process with async I/O
struct McpClient {
    child: std::process::Child,
    tx: Sender<Value>,
    rx: Receiver<Value>,
}

impl McpClient {
    fn spawn() -> Self {
        // Point at a closed local port so no test depends on a running Qdrant
        let mut child = Command::new(env!("CARGO_BIN_EXE_ragfuse"))
            .env("RAGFUSE_QDRANT__URL", "http://127.0.0.1:9")
            .env("RAGFUSE_QDRANT__AUX_TIMEOUT_SECS", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())  // Suppress log output in tests
            .spawn()
            .expect("Failed to spawn ragfuse binary");

        let mut stdin = child.stdin.take().expect("Failed to get stdin");
        let stdout = child.stdout.take().expect("Failed to get stdout");

        // Channel for sending requests
        let (req_tx, req_rx) = channel::<Value>();

        // Channel for receiving responses
        let (resp_tx, resp_rx) = channel::<Value>();

        // Thread to write requests to stdin
        thread::spawn(move || {
            while let Ok(request) = req_rx.recv() {
                let request_str = serde_json::to_string(&request).expect("Failed to serialize");
                if writeln!(stdin, "{}", request_str).is_err() {
                    break;
                }
                if stdin.flush().is_err() {
                    break;
                }
            }
        });

        // Thread to read responses from stdout
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        if let Ok(value) = serde_json::from_str::<Value>(&line) {
                            if resp_tx.send(value).is_err() {
                                break;
                            }
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        McpClient {
            child,
            tx: req_tx,
            rx: resp_rx,
        }
    }

    fn send_request(&self, request: Value) -> Option<Value> {
        self.tx.send(request).ok()?;
        self.rx.recv_timeout(Duration::from_secs(2)).ok()
    }

    fn send_notification(&self, notification: Value) {
        let _ = self.tx.send(notification);
        // Notifications don't have responses, give server time to process
        thread::sleep(Duration::from_millis(50));
    }

    /// initialize + notifications/initialized
    fn handshake(&self) {
        self.send_request(json!({
            "jsonrpc": "2.0",
            "method": "initialize",
            "id": 1,
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "1.0"}
            }
        }))
        .expect("Failed to initialize");

        self.send_notification(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }));
    }

    fn call_tool(&self, id: u64, name: &str, arguments: Value) -> Value {
        self.send_request(json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": id,
            "params": {"name": name, "arguments": arguments}
        }))
        .unwrap_or_else(|| panic!("Failed to get {} response", name))
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn test_initialize_handshake() {
    let client = McpClient::spawn();

    // Send initialize request
    let initialize_request = json!({
        "jsonrpc": "2.0",
        "method": "initialize",
        "id": 1,
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        }
    });

    let response = client.send_request(initialize_request)
        .expect("Failed to get initialize response");

    // Verify response structure
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert!(response["result"].is_object());

    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert!(result["capabilities"]["tools"].is_object());
    assert_eq!(result["serverInfo"]["name"], "ragfuse");
    assert!(result["serverInfo"]["version"].is_string());
    assert!(result["serverInfo"]["description"].is_string());

    // Send initialized notification (no response expected)
    client.send_notification(json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }));
}

#[test]
fn test_tool_discovery() {
    let client = McpClient::spawn();
    client.handshake();

    let response = client.send_request(json!({
        "jsonrpc": "2.0",
        "method": "tools/list",
        "id": 2
    }))
    .expect("Failed to get tools/list response");

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 2);
    assert!(response["result"]["tools"].is_array());

    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 3, "Should have exactly 3 tools");

    let tool_names: Vec<String> = tools.iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();

    assert!(tool_names.contains(&"search".to_string()));
    assert!(tool_names.contains(&"rag".to_string()));
    assert!(tool_names.contains(&"health_check".to_string()));

    // Verify each tool has required fields
    for tool in tools {
        assert!(tool["name"].is_string());
        assert!(tool["description"].is_string());
        assert!(tool["inputSchema"].is_object());
    }

    // Request parameters are described in the schema
    let rag = tools.iter().find(|t| t["name"] == "rag").unwrap();
    assert!(rag["inputSchema"]["properties"]["mmr_lambda"].is_object());
    assert!(rag["inputSchema"]["properties"]["query"].is_object());
}

#[test]
fn test_search_empty_query_validation_error() {
    let client = McpClient::spawn();
    client.handshake();

    let response = client.call_tool(2, "search", json!({"query": "   "}));

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 2);
    let result = &response["result"];
    assert_eq!(result["isError"], true, "Should have isError: true");

    let content_arr = result["content"].as_array().expect("content should be array");
    let error_text = content_arr[0]["text"].as_str().expect("should have error text");
    assert!(error_text.to_lowercase().contains("query"),
            "Error message should mention 'query': {}", error_text);

    if result["structuredContent"].is_object() {
        assert_eq!(result["structuredContent"]["field"], "query");
    }
}

#[test]
fn test_rag_out_of_range_validation_error() {
    let client = McpClient::spawn();
    client.handshake();

    let response = client.call_tool(2, "rag", json!({"query": "что такое остовное дерево", "limit": 50}));

    let result = &response["result"];
    assert_eq!(result["isError"], true, "Should have isError: true");
    if result["structuredContent"].is_object() {
        assert_eq!(result["structuredContent"]["field"], "limit");
    }

    let response = client.call_tool(3, "rag", json!({"query": "граф", "mmr_lambda": 2.0}));
    let result = &response["result"];
    assert_eq!(result["isError"], true, "Should have isError: true");
    if result["structuredContent"].is_object() {
        assert_eq!(result["structuredContent"]["field"], "mmr_lambda");
    }
}

#[test]
fn test_health_check() {
    let client = McpClient::spawn();
    client.handshake();

    let response = client.call_tool(2, "health_check", json!({}));

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 2);
    assert!(response["result"].is_object());

    let result = &response["result"];
    assert!(result["isError"].is_null() || result["isError"] == false);

    // Check structured content for health data
    if result["structuredContent"].is_object() {
        let health = &result["structuredContent"];
        assert_eq!(health["status"], "ok");
        assert!(health["version"].is_string());
        assert!(health["uptime_seconds"].is_number());
        // nothing listens on the configured port
        assert_eq!(health["index"], "unreachable");
        assert_eq!(health["embedding_loaded"], false);
    }
}

fn run_with_env(key: &str, value: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_ragfuse"))
        .arg("serve")
        .env(key, value)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to run ragfuse binary")
}

#[test]
fn test_invalid_config_exits_nonzero() {
    let output = run_with_env("RAGFUSE_QDRANT__VECTOR_SIZE", "0");
    assert!(!output.status.success(), "invalid config must not start the server");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("vector_size"), "stderr should name the bad key: {}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_out_of_range_lambda_exits_nonzero() {
    let output = run_with_env("RAGFUSE_RAG__MMR_LAMBDA", "1.5");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("mmr_lambda"));
}
