use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct OpenAiStubConfig {
    /// Text returned by chat completions, buffered or streamed.
    pub reply: String,
    pub behavior: ChatBehavior,
    /// Content returned for structured requests, keyed by the
    /// `response_format.json_schema.name` they ask for.
    pub structured: Vec<(&'static str, Value)>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum ChatBehavior {
    Reply,
    /// Answer chat requests with this status and an OpenAI-style error body.
    Fail(u16),
}

pub struct OpenAiStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OpenAiStub {
    pub fn spawn(config: OpenAiStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let method = request.method().clone();

                if method == tiny_http::Method::Get && path == "/v1/models" {
                    let body = serde_json::json!({
                        "object": "list",
                        "data": [
                            { "id": "stub-model", "owned_by": "stub" },
                            { "id": "stub-model-large", "owned_by": "stub" }
                        ]
                    });
                    let _ = request.respond(json_response(200, &body));
                    continue;
                }

                if method != tiny_http::Method::Post || path != "/v1/chat/completions" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };
                let stream = parsed
                    .get("stream")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let schema_name = parsed
                    .pointer("/response_format/json_schema/name")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                recorded.lock().expect("lock recorded requests").push(parsed);

                if let ChatBehavior::Fail(status) = config.behavior {
                    let body = serde_json::json!({
                        "error": { "message": "stub refused the request", "type": "stub_error" }
                    });
                    let _ = request.respond(json_response(status, &body));
                    continue;
                }

                let content = schema_name
                    .and_then(|name| {
                        config
                            .structured
                            .iter()
                            .find(|(key, _)| *key == name)
                            .map(|(_, value)| value.to_string())
                    })
                    .unwrap_or_else(|| config.reply.clone());

                if stream {
                    let _ = request.respond(sse_response(&content));
                } else {
                    let body = serde_json::json!({
                        "id": "chatcmpl_stub",
                        "object": "chat.completion",
                        "choices": [
                            {
                                "index": 0,
                                "message": { "role": "assistant", "content": content },
                                "finish_reason": "stop"
                            }
                        ]
                    });
                    let _ = request.respond(json_response(200, &body));
                }
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Chat request bodies received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("lock recorded requests").clone()
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn json_response(status: u16, body: &Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}

/// One `data:` event per word, a keep-alive comment, then `[DONE]`.
fn sse_response(reply: &str) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let mut body = String::from(": stub stream\n\n");
    for piece in reply.split_inclusive(' ') {
        let event = serde_json::json!({
            "choices": [ { "index": 0, "delta": { "content": piece } } ]
        });
        body.push_str(&format!("data: {event}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");

    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/event-stream"[..])
        .expect("build header");
    tiny_http::Response::from_string(body).with_header(header)
}

/// Writes an LLM config file pointing at `base_url`.
#[allow(dead_code)]
pub fn write_llm_config(dir: &std::path::Path, base_url: &str) -> std::path::PathBuf {
    let path = dir.join("llm.json");
    let config = serde_json::json!({
        "apiUrl": base_url,
        "apiKey": "sk-test-123456",
        "model": "stub-model",
        "temperature": 0.5,
        "maxTokens": 256
    });
    std::fs::write(&path, config.to_string()).expect("write llm config");
    path
}
