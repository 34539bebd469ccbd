//! Client side of the execution server's WebSocket protocol.
//!
//! Running a single node opens one socket: the client sends `connect` and `graph`
//! messages, then applies `session`/`progress`/`status` updates until a terminal
//! `data` or `error` message arrives, at which point the socket is closed. There is
//! no reconnection.

use crate::error::FlowError;
use crate::types::{NodeId, SerializedGraph};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::mpsc::Receiver;

/// Messages sent to the execution server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Opens a session
    Connect {
        /// Client-chosen session id
        session_id: String,
    },
    /// Graph to execute
    Graph {
        /// Serialized nodes and links
        graph_data: SerializedGraph,
    },
}

/// Messages received from the execution server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Session acknowledged
    Session {
        /// Session id assigned or echoed by the server
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Final results
    Data {
        /// Node the `result` belongs to; defaults to the executed node
        #[serde(default)]
        node_id: Option<String>,
        /// Result of a single node
        #[serde(default)]
        result: Option<Value>,
        /// Results keyed by node id
        #[serde(default)]
        results: Map<String, Value>,
    },
    /// Execution failed
    Error {
        /// Human readable message
        message: String,
        /// Failing node, if known
        #[serde(default)]
        node_id: Option<String>,
    },
    /// Progress report of one node
    Progress {
        /// Reporting node; defaults to the executed node
        #[serde(default)]
        node_id: Option<String>,
        /// Percentage in `0..=100`
        progress: f32,
        /// Label for the progress bar
        #[serde(default)]
        text: Option<String>,
    },
    /// Free-form status line
    Status {
        /// Status text
        message: String,
    },
}

/// What the editor should do in response to server traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// The server acknowledged the session
    SessionStarted(String),
    /// A node produced a result
    Result {
        /// Receiving node
        node: NodeId,
        /// Payload
        value: Value,
    },
    /// A node reported progress
    Progress {
        /// Reporting node
        node: NodeId,
        /// Percentage
        progress: f32,
        /// Optional label
        text: Option<String>,
    },
    /// Status line for the toolbar
    Status(String),
    /// Execution failed
    Error {
        /// Failing node, if known
        node: Option<NodeId>,
        /// Message
        message: String,
    },
    /// The socket was closed; no further events follow
    Closed,
}

/// Protocol state of one execution request.
#[derive(Debug, Clone)]
pub struct ExecutionSession {
    session_id: String,
    target: NodeId,
    is_closing: bool,
}

impl ExecutionSession {
    /// Creates a session for running `target`.
    pub fn new(target: NodeId) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            target,
            is_closing: false,
        }
    }

    /// Session id sent with `connect`.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Node being executed.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Whether the session has started closing.
    pub fn is_closing(&self) -> bool {
        self.is_closing
    }

    /// Messages to send right after the socket opens.
    pub fn opening_messages(&self, graph: SerializedGraph) -> Vec<ClientMessage> {
        vec![
            ClientMessage::Connect {
                session_id: self.session_id.clone(),
            },
            ClientMessage::Graph { graph_data: graph },
        ]
    }

    /// Marks the session as closing. Returns `true` only on the first call.
    pub fn close(&mut self) -> bool {
        if self.is_closing {
            return false;
        }
        self.is_closing = true;
        true
    }

    fn node_or_target(&self, id: Option<&str>) -> NodeId {
        id.and_then(|s| uuid::Uuid::parse_str(s).ok()).unwrap_or(self.target)
    }

    /// Parses and applies one text frame. Unparsable frames are logged and ignored.
    pub fn handle_text(&mut self, text: &str) -> Vec<ExecutionEvent> {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => self.handle(message),
            Err(err) => {
                log::warn!("{}", FlowError::Protocol(err.to_string()));
                Vec::new()
            }
        }
    }

    /// Applies one server message. Terminal messages close the session; messages
    /// arriving after that are dropped.
    pub fn handle(&mut self, message: ServerMessage) -> Vec<ExecutionEvent> {
        if self.is_closing {
            log::debug!("Ignoring message after close: {message:?}");
            return Vec::new();
        }
        match message {
            ServerMessage::Session { session_id } => {
                vec![ExecutionEvent::SessionStarted(session_id.unwrap_or_else(|| self.session_id.clone()))]
            }
            ServerMessage::Progress { node_id, progress, text } => vec![ExecutionEvent::Progress {
                node: self.node_or_target(node_id.as_deref()),
                progress,
                text,
            }],
            ServerMessage::Status { message } => vec![ExecutionEvent::Status(message)],
            ServerMessage::Data { node_id, result, results } => {
                let mut events = Vec::new();
                if let Some(value) = result {
                    events.push(ExecutionEvent::Result {
                        node: self.node_or_target(node_id.as_deref()),
                        value,
                    });
                }
                for (id, value) in results {
                    match uuid::Uuid::parse_str(&id) {
                        Ok(node) => events.push(ExecutionEvent::Result { node, value }),
                        Err(_) => log::warn!("Result for unknown node id '{id}'"),
                    }
                }
                self.close();
                events.push(ExecutionEvent::Closed);
                events
            }
            ServerMessage::Error { message, node_id } => {
                self.close();
                vec![
                    ExecutionEvent::Error {
                        node: Some(self.node_or_target(node_id.as_deref())),
                        message,
                    },
                    ExecutionEvent::Closed,
                ]
            }
        }
    }

    /// Handles a transport failure. Returns the events to report, which are empty
    /// when the session was already closing.
    pub fn fail(&mut self, error: FlowError) -> Vec<ExecutionEvent> {
        if !self.close() {
            return Vec::new();
        }
        vec![
            ExecutionEvent::Error {
                node: Some(self.target),
                message: error.to_string(),
            },
            ExecutionEvent::Closed,
        ]
    }
}

/// A running execution request. Dropping it aborts the socket task.
pub struct ExecutionHandle {
    /// Node being executed
    pub target: NodeId,
    receiver: Receiver<ExecutionEvent>,
    #[cfg(not(target_arch = "wasm32"))]
    task: tokio::task::JoinHandle<()>,
}

impl ExecutionHandle {
    /// Events received since the last call.
    pub fn drain(&self) -> Vec<ExecutionEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for ExecutionHandle {
    fn drop(&mut self) {
        #[cfg(not(target_arch = "wasm32"))]
        self.task.abort();
    }
}

/// Opens a socket to `url` and executes `graph` for `target` in the background.
///
/// Must be called from within a tokio runtime on native targets.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_execution(
    url: &str,
    target: NodeId,
    graph: SerializedGraph,
    ctx: eframe::egui::Context,
) -> Result<ExecutionHandle, FlowError> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|e| FlowError::Channel(e.to_string()))?;
    let (sender, receiver) = std::sync::mpsc::channel();
    let url = url.to_string();
    let task = runtime.spawn(async move {
        let mut session = ExecutionSession::new(target);
        let events = match run_socket(&url, &mut session, graph, &sender, &ctx).await {
            Ok(()) => {
                if session.close() {
                    vec![ExecutionEvent::Closed]
                } else {
                    Vec::new()
                }
            }
            Err(err) => {
                log::error!("Execution of {target} failed: {err}");
                session.fail(err)
            }
        };
        for event in events {
            let _ = sender.send(event);
        }
        ctx.request_repaint();
    });
    Ok(ExecutionHandle { target, receiver, task })
}

#[cfg(not(target_arch = "wasm32"))]
async fn run_socket(
    url: &str,
    session: &mut ExecutionSession,
    graph: SerializedGraph,
    sender: &std::sync::mpsc::Sender<ExecutionEvent>,
    ctx: &eframe::egui::Context,
) -> Result<(), FlowError> {
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let channel_error = |e: tokio_tungstenite::tungstenite::Error| FlowError::Channel(e.to_string());
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.map_err(channel_error)?;
    log::info!("Connected to {url} (session {})", session.session_id());

    for message in session.opening_messages(graph) {
        let text = serde_json::to_string(&message)?;
        socket.send(Message::text(text)).await.map_err(channel_error)?;
    }

    while let Some(frame) = socket.next().await {
        match frame.map_err(channel_error)? {
            Message::Text(text) => {
                for event in session.handle_text(text.as_str()) {
                    let _ = sender.send(event);
                }
                ctx.request_repaint();
            }
            Message::Close(_) => break,
            _ => {}
        }
        if session.is_closing() {
            if let Err(err) = socket.close(None).await {
                log::debug!("Socket close failed: {err}");
            }
            break;
        }
    }
    Ok(())
}

/// Browser builds have no execution transport.
#[cfg(target_arch = "wasm32")]
pub fn spawn_execution(
    _url: &str,
    _target: NodeId,
    _graph: SerializedGraph,
    _ctx: eframe::egui::Context,
) -> Result<ExecutionHandle, FlowError> {
    Err(FlowError::Channel("node execution is only available in the desktop build".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_are_tagged() {
        let session = ExecutionSession::new(uuid::Uuid::new_v4());
        let messages = session.opening_messages(SerializedGraph::default());
        let connect = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(connect["type"], "connect");
        assert_eq!(connect["session_id"], session.session_id());
        let graph = serde_json::to_value(&messages[1]).unwrap();
        assert_eq!(graph["type"], "graph");
        assert_eq!(graph["graph_data"], json!({"nodes": [], "links": []}));
    }

    #[test]
    fn progress_and_status_keep_session_open() {
        let target = uuid::Uuid::new_v4();
        let mut session = ExecutionSession::new(target);
        let events = session.handle_text(r#"{"type":"progress","progress":40,"text":"fetching"}"#);
        assert_eq!(
            events,
            vec![ExecutionEvent::Progress {
                node: target,
                progress: 40.0,
                text: Some("fetching".into())
            }]
        );
        let events = session.handle_text(r#"{"type":"status","message":"running"}"#);
        assert_eq!(events, vec![ExecutionEvent::Status("running".into())]);
        assert!(!session.is_closing());
    }

    #[test]
    fn data_is_terminal_and_closing_is_idempotent() {
        let target = uuid::Uuid::new_v4();
        let other = uuid::Uuid::new_v4();
        let mut session = ExecutionSession::new(target);
        let text = json!({"type": "data", "result": "ok", "results": {other.to_string(): 1}}).to_string();
        let events = session.handle_text(&text);
        assert_eq!(
            events,
            vec![
                ExecutionEvent::Result { node: target, value: json!("ok") },
                ExecutionEvent::Result { node: other, value: json!(1) },
                ExecutionEvent::Closed,
            ]
        );
        assert!(session.is_closing());
        assert!(!session.close());
        assert!(session.handle_text(r#"{"type":"status","message":"late"}"#).is_empty());
        assert!(session.fail(FlowError::Channel("reset".into())).is_empty());
    }

    #[test]
    fn error_closes_with_message() {
        let target = uuid::Uuid::new_v4();
        let mut session = ExecutionSession::new(target);
        let events = session.handle_text(r#"{"type":"error","message":"bad input"}"#);
        assert_eq!(
            events,
            vec![
                ExecutionEvent::Error {
                    node: Some(target),
                    message: "bad input".into()
                },
                ExecutionEvent::Closed
            ]
        );
    }

    #[test]
    fn garbage_is_ignored() {
        let mut session = ExecutionSession::new(uuid::Uuid::new_v4());
        assert!(session.handle_text("not json").is_empty());
        assert!(session.handle_text(r#"{"type":"unknown"}"#).is_empty());
        assert!(!session.is_closing());
    }
}
