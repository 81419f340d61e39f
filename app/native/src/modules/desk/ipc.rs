//! IPC request handling for the desk.
//!
//! Connections are served on their own threads, outside the tokio runtime, so
//! every request goes through the blocking side of [`DeskHandle`].

use super::actor::{DeskCommand, DeskHandle, DeskMessage, DeskQuery, QueryResult};
use super::error::DeskError;
use super::window::WindowSignal;
use crate::utils::ipc_socket::{IpcRequest, IpcResponse};

/// Handles one IPC request against a running desk.
#[must_use]
pub fn handle_ipc_request(handle: &DeskHandle, request: IpcRequest) -> IpcResponse {
    tracing::trace!(?request, "desk: ipc request");
    let command = match request {
        IpcRequest::Ping => return IpcResponse::success("pong"),
        IpcRequest::Status => return query(handle, DeskQuery::Status),
        IpcRequest::Avatar { url } => return query(handle, DeskQuery::Avatar { url }),
        IpcRequest::FinishLoad { url } => {
            return signal(handle, DeskMessage::Window { url, signal: WindowSignal::FinishLoad });
        }
        IpcRequest::FinishRenderCard { url } => {
            let msg = DeskMessage::Window { url, signal: WindowSignal::FinishRenderCard };
            return signal(handle, msg);
        }
        IpcRequest::DispatchAction { action } => DeskCommand::DispatchAction(action),
        IpcRequest::BringToFront { url, rearrange } => DeskCommand::BringToFront { url, rearrange },
        IpcRequest::SendToBack { url } => DeskCommand::SendToBack { url },
        IpcRequest::SetWindowSize { url, width, height } => {
            DeskCommand::SetWindowSize { url, width, height }
        }
        IpcRequest::SetWindowPosition { url, x, y } => DeskCommand::SetWindowPosition { url, x, y },
        IpcRequest::Focus { url } => DeskCommand::Focus { url },
        IpcRequest::Blur { url } => DeskCommand::Blur { url },
        IpcRequest::BlurAndFocus { url, mode } => DeskCommand::BlurAndFocus { url, mode },
        IpcRequest::DeleteAvatar { url } => DeskCommand::DeleteAvatar { url },
        IpcRequest::SwitchWorkspace { id } => DeskCommand::SwitchWorkspace { id },
        IpcRequest::Exit => DeskCommand::Exit,
    };

    match handle.blocking_command(command) {
        Ok(reply) => IpcResponse::success(reply),
        Err(err) => IpcResponse::failure(err),
    }
}

fn query(handle: &DeskHandle, query: DeskQuery) -> IpcResponse {
    match handle.blocking_query(query) {
        Ok(QueryResult::Status(status)) => IpcResponse::success(status),
        Ok(QueryResult::Avatar(avatar)) => IpcResponse::success(avatar),
        Ok(QueryResult::RenderWatch(_)) => IpcResponse::error("render watches are not served over ipc"),
        Err(err) => IpcResponse::failure(DeskError::from(err)),
    }
}

fn signal(handle: &DeskHandle, msg: DeskMessage) -> IpcResponse {
    match handle.send(msg) {
        Ok(()) => IpcResponse::success(serde_json::Value::Null),
        Err(err) => IpcResponse::failure(DeskError::from(err)),
    }
}
