//! Unix Domain Socket IPC between the CLI and the serving process.
//!
//! # Architecture
//!
//! - `rxdesk serve` starts a socket server in the cache directory
//! - CLI commands connect, send one JSON request line and read one JSON response line
//! - If the socket doesn't exist or refuses connections, the desk is not running
//!
//! # Request Format
//!
//! Requests are JSON objects with a `type` field and optional parameters:
//!
//! ```json
//! {"type": "status"}
//! {"type": "bringToFront", "url": "rxdesktop://local/ws/w1/c1/a", "rearrange": true}
//! {"type": "switchWorkspace", "id": "w2"}
//! ```
//!
//! # Response Format
//!
//! Responses are JSON with either `data` or `error`:
//!
//! ```json
//! {"data": {"z": 3}}
//! {"error": {"kind": "NotFound", "message": "rxdesktop://local/ws/w1/c1/a"}}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::get_cache_dir;
use crate::modules::desk::{AvatarUrl, PersistentAction, SuppressMode};

/// Socket filename within the cache directory.
const SOCKET_FILENAME: &str = "rxdesk.sock";

/// Default timeout for socket operations in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Number of retry attempts for transient connection failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retry attempts in milliseconds.
const RETRY_DELAY_MS: u64 = 100;

// ============================================================================
// Request Types
// ============================================================================

/// Requests that can be sent from the CLI to the desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IpcRequest {
    /// Check that the desk is running.
    Ping,

    /// Snapshot of the desk.
    Status,

    /// Read one avatar document.
    Avatar { url: AvatarUrl },

    /// Dispatch a persistent action as if the avatar's window sent it.
    DispatchAction { action: PersistentAction },

    BringToFront {
        url: AvatarUrl,
        #[serde(default)]
        rearrange: bool,
    },

    SendToBack { url: AvatarUrl },

    SetWindowSize { url: AvatarUrl, width: i32, height: i32 },

    SetWindowPosition { url: AvatarUrl, x: i32, y: i32 },

    Focus { url: AvatarUrl },

    Blur { url: AvatarUrl },

    /// Re-take focus for a window with event suppression.
    BlurAndFocus { url: AvatarUrl, mode: SuppressMode },

    /// Renderer callback: the index page finished loading.
    FinishLoad { url: AvatarUrl },

    /// Renderer callback: the card finished rendering.
    FinishRenderCard { url: AvatarUrl },

    /// Destroy an avatar's window and delete the avatar document.
    DeleteAvatar { url: AvatarUrl },

    SwitchWorkspace { id: String },

    /// Close every window and stop the desk.
    Exit,
}

/// Response from the desk to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpcResponse {
    /// Successful response with data.
    Success { data: serde_json::Value },
    /// Error response.
    Error { error: serde_json::Value },
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(data: impl Serialize) -> Self {
        Self::Success {
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Creates an error response from a structured error.
    pub fn failure(error: impl Serialize) -> Self {
        Self::Error {
            error: serde_json::to_value(error).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Creates an error response from a plain message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: serde_json::Value::String(message.into()),
        }
    }
}

// ============================================================================
// Socket Path
// ============================================================================

/// Gets the path to the IPC socket.
#[must_use]
pub fn get_socket_path() -> PathBuf { get_cache_dir().join(SOCKET_FILENAME) }

fn remove_socket(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

// ============================================================================
// Server (Desk Side)
// ============================================================================

/// A running socket server. Stops when dropped.
pub struct IpcServer {
    path: PathBuf,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Starts the IPC server on the default socket path.
///
/// # Errors
///
/// See [`start_server_at`].
pub fn start_server<F>(handler: F) -> std::io::Result<IpcServer>
where F: Fn(IpcRequest) -> IpcResponse + Send + Sync + 'static {
    start_server_at(get_socket_path(), handler)
}

/// Starts the IPC server on `path`.
///
/// The server runs in a background thread and handles every connection on its
/// own thread. A stale socket file is replaced; a live one is not.
///
/// # Errors
///
/// Returns `AddrInUse` if another server answers on `path`, or the error from
/// binding the socket or spawning the thread.
pub fn start_server_at<F>(path: PathBuf, handler: F) -> std::io::Result<IpcServer>
where F: Fn(IpcRequest) -> IpcResponse + Send + Sync + 'static {
    if path.exists() {
        if UnixStream::connect(&path).is_ok() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("another rxdesk is listening on {}", path.display()),
            ));
        }
        remove_socket(&path);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&path)?;
    tracing::info!(path = %path.display(), "ipc: server listening");

    let running = Arc::new(AtomicBool::new(true));
    let handler = Arc::new(handler);
    let thread = {
        let running = running.clone();
        thread::Builder::new()
            .name("ipc-server".to_string())
            .spawn(move || server_loop(&listener, &running, &handler))?
    };

    Ok(IpcServer { path, running, thread: Some(thread) })
}

impl IpcServer {
    /// Path the server listens on.
    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Stops accepting connections and removes the socket file.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // Wake the blocking accept so the loop sees the flag.
        let _ = UnixStream::connect(&self.path);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        remove_socket(&self.path);
        tracing::debug!(path = %self.path.display(), "ipc: server stopped");
    }

    /// Returns whether the server is accepting connections.
    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }
}

impl Drop for IpcServer {
    fn drop(&mut self) { self.stop(); }
}

fn server_loop<F>(listener: &UnixListener, running: &AtomicBool, handler: &Arc<F>)
where F: Fn(IpcRequest) -> IpcResponse + Send + Sync + 'static {
    for stream in listener.incoming() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match stream {
            Ok(stream) => {
                let handler = handler.clone();
                let spawned = thread::Builder::new()
                    .name("ipc-connection".to_string())
                    .spawn(move || handle_connection(stream, handler.as_ref()));
                if let Err(err) = spawned {
                    tracing::warn!("ipc: failed to spawn connection thread: {err}");
                }
            }
            Err(err) => {
                tracing::warn!("ipc: connection error: {err}");
            }
        }
    }
}

#[allow(clippy::needless_pass_by_value)] // Ownership needed - stream is consumed
fn handle_connection<F>(stream: UnixStream, handler: &F)
where F: Fn(IpcRequest) -> IpcResponse {
    let _ = stream.set_read_timeout(Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)));

    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
        return;
    }

    let response = match serde_json::from_str::<IpcRequest>(line.trim()) {
        Ok(request) => handler(request),
        Err(err) => IpcResponse::error(format!("Invalid request: {err}")),
    };

    let response_json = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string());

    let mut stream = stream;
    let _ = writeln!(stream, "{response_json}");
}

// ============================================================================
// Client (CLI Side)
// ============================================================================

/// Error type for IPC client operations.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The desk is not running (socket doesn't exist or can't connect).
    #[error("rxdesk is not running")]
    AppNotRunning,
    /// The desk did not answer in time.
    #[error("Connection timed out")]
    Timeout,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The desk answered with something that is not a response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Sends a request to the running desk and returns the response.
///
/// Retries up to three times while the desk is unreachable.
///
/// # Errors
///
/// Returns [`IpcError::AppNotRunning`] if no desk answers, or the first
/// non-transient failure.
pub fn send_request(request: &IpcRequest) -> Result<IpcResponse, IpcError> {
    send_request_to(&get_socket_path(), request)
}

/// Sends a request to the desk listening on `path`.
///
/// # Errors
///
/// Same as [`send_request`].
pub fn send_request_to(path: &Path, request: &IpcRequest) -> Result<IpcResponse, IpcError> {
    let mut last_error = IpcError::AppNotRunning;

    for attempt in 0..MAX_RETRIES {
        match send_request_once(path, request) {
            Ok(response) => return Ok(response),
            Err(err) => {
                last_error = err;

                // Timeouts and bad responses are real failures, not startup races.
                if !matches!(last_error, IpcError::AppNotRunning) {
                    break;
                }

                if attempt < MAX_RETRIES - 1 {
                    thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
            }
        }
    }

    Err(last_error)
}

fn send_request_once(path: &Path, request: &IpcRequest) -> Result<IpcResponse, IpcError> {
    if !path.exists() {
        return Err(IpcError::AppNotRunning);
    }

    let mut stream = UnixStream::connect(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::NotFound
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset => IpcError::AppNotRunning,
        _ => IpcError::Io(err),
    })?;

    let timeout = Duration::from_millis(DEFAULT_TIMEOUT_MS);
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let request_json = serde_json::to_string(request)
        .map_err(|err| IpcError::InvalidResponse(format!("Failed to serialize request: {err}")))?;

    writeln!(stream, "{request_json}").map_err(|err| {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            IpcError::AppNotRunning
        } else {
            IpcError::Io(err)
        }
    })?;

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).map_err(|err| match err.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => IpcError::Timeout,
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
            IpcError::AppNotRunning
        }
        _ => IpcError::Io(err),
    })?;

    serde_json::from_str(response_line.trim())
        .map_err(|err| IpcError::InvalidResponse(format!("Failed to parse response: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::desk::ActionKind;
    use crate::modules::desk::actions::Position;

    fn url() -> AvatarUrl { AvatarUrl::local("w1", "c1", "a") }

    #[test]
    fn test_socket_path() {
        let path = get_socket_path();
        assert!(path.to_string_lossy().contains("rxdesk.sock"));
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_string(&IpcRequest::Status).unwrap();
        assert_eq!(json, r#"{"type":"status"}"#);

        let request = IpcRequest::BringToFront { url: url(), rearrange: true };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"bringToFront""#));
        assert!(json.contains(r#""url":"rxdesktop://local/ws/w1/c1/a""#));
        assert!(json.contains(r#""rearrange":true"#));
    }

    #[test]
    fn test_request_defaults_and_validation() {
        let request: IpcRequest = serde_json::from_str(
            r#"{"type":"bringToFront","url":"rxdesktop://local/ws/w1/c1/a"}"#,
        )
        .unwrap();
        assert_eq!(request, IpcRequest::BringToFront { url: url(), rearrange: false });

        let bad = serde_json::from_str::<IpcRequest>(r#"{"type":"sendToBack","url":"http://x"}"#);
        assert!(bad.is_err());

        let request: IpcRequest = serde_json::from_str(
            r#"{"type":"blurAndFocus","url":"rxdesktop://local/ws/w1/c1/a","mode":"focus-event"}"#,
        )
        .unwrap();
        assert_eq!(request, IpcRequest::BlurAndFocus { url: url(), mode: SuppressMode::FocusEvent });
    }

    #[test]
    fn test_dispatch_action_request_carries_wire_action() {
        let json = r#"{"type":"dispatchAction","action":{
            "type":"position-update","url":"rxdesktop://local/ws/w1/c1/a",
            "payload":{"x":10,"y":20}}}"#;
        let request: IpcRequest = serde_json::from_str(json).unwrap();
        let IpcRequest::DispatchAction { action } = request else {
            panic!("Expected dispatchAction");
        };
        assert_eq!(action.url, url());
        assert_eq!(action.kind, ActionKind::PositionUpdate(Position { x: 10, y: 20 }));
        assert!(!action.skip_forward);
    }

    #[test]
    fn test_response_serialization() {
        let json = serde_json::to_string(&IpcResponse::success(vec![1, 2, 3])).unwrap();
        assert_eq!(json, r#"{"data":[1,2,3]}"#);

        let json = serde_json::to_string(&IpcResponse::error("Not found")).unwrap();
        assert_eq!(json, r#"{"error":"Not found"}"#);
    }

    #[test]
    fn test_round_trip_through_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let mut server = start_server_at(path.clone(), |request| match request {
            IpcRequest::Ping => IpcResponse::success("pong"),
            other => IpcResponse::error(format!("unexpected {other:?}")),
        })
        .unwrap();

        let response = send_request_to(&path, &IpcRequest::Ping).unwrap();
        assert!(matches!(response, IpcResponse::Success { data } if data == "pong"));

        let response = send_request_to(&path, &IpcRequest::Exit).unwrap();
        assert!(matches!(response, IpcResponse::Error { .. }));

        server.stop();
        assert!(!server.is_running());
        assert!(!path.exists());
    }

    #[test]
    fn test_second_server_on_live_socket_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let _server = start_server_at(path.clone(), |_| IpcResponse::success("pong")).unwrap();

        let second = start_server_at(path, |_| IpcResponse::success("pong"));
        assert!(matches!(second, Err(err) if err.kind() == std::io::ErrorKind::AddrInUse));
    }

    #[test]
    fn test_not_running_when_no_socket() {
        let dir = tempfile::tempdir().unwrap();
        let result = send_request_to(&dir.path().join("absent.sock"), &IpcRequest::Ping);
        assert!(matches!(result, Err(IpcError::AppNotRunning)));
    }
}
