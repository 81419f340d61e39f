//! CLI output formatting.

use colored::Colorize;
use serde_json::Value;

use crate::error::RxdeskError;
use crate::utils::ipc_socket::IpcResponse;

/// Prints a desk response. Errors are returned so the process exits non-zero.
pub fn print_response(response: IpcResponse, json: bool, is_status: bool) -> Result<(), RxdeskError> {
    match response {
        IpcResponse::Success { data } if json => {
            println!("{}", pretty(&data));
            Ok(())
        }
        IpcResponse::Success { data } if is_status => {
            print_status(&data);
            Ok(())
        }
        IpcResponse::Success { data: Value::Null } => Ok(()),
        IpcResponse::Success { data } => {
            println!("{}", pretty(&data));
            Ok(())
        }
        IpcResponse::Error { error } if json => {
            println!("{}", serde_json::json!({ "error": error }));
            Err(RxdeskError::Rejected(error_message(&error)))
        }
        IpcResponse::Error { error } => Err(RxdeskError::Rejected(error_message(&error))),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Flattens `{kind, message}` errors into one line.
fn error_message(error: &Value) -> String {
    match (error.get("kind").and_then(Value::as_str), error.get("message")) {
        (Some(kind), Some(Value::String(message))) => format!("{kind}: {message}"),
        (Some(kind), Some(message)) => format!("{kind}: {message}"),
        (Some(kind), None) => kind.to_string(),
        _ => error.as_str().map_or_else(|| error.to_string(), str::to_string),
    }
}

fn print_status(status: &Value) {
    let workspace = status["currentWorkspace"].as_str().unwrap_or("-");
    let phase = status["phase"]["phase"].as_str().unwrap_or("?");
    println!("{} {} ({})", "workspace".bold(), workspace.cyan(), phase.dimmed());

    let windows = status["windows"].as_array().map_or(&[][..], Vec::as_slice);
    if windows.is_empty() {
        println!("{}", "  no windows".dimmed());
        return;
    }

    for window in windows {
        let url = window["url"].as_str().unwrap_or("?");
        let bounds = &window["bounds"];
        let geometry = format!(
            "{},{} {}x{}",
            bounds["x"], bounds["y"], bounds["width"], bounds["height"]
        );
        let render = window["render"].as_str().unwrap_or("?");
        let line = format!("  {url}  {geometry}  {render}");
        if window["focused"].as_bool().unwrap_or(false) {
            println!("{}", line.green());
        } else {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_message_flattens_kind_and_message() {
        let error = json!({"kind": "NotFound", "message": "rxdesktop://local/ws/w1/c1/a"});
        assert_eq!(error_message(&error), "NotFound: rxdesktop://local/ws/w1/c1/a");

        assert_eq!(error_message(&json!({"kind": "SwitchInProgress"})), "SwitchInProgress");
        assert_eq!(error_message(&json!("Invalid request")), "Invalid request");
    }

    #[test]
    fn test_error_response_is_err() {
        let response = IpcResponse::error("boom");
        let result = print_response(response, false, false);
        assert!(matches!(result, Err(RxdeskError::Rejected(message)) if message == "boom"));
    }

    #[test]
    fn test_null_success_prints_nothing() {
        let response = IpcResponse::success(Value::Null);
        assert!(print_response(response, false, false).is_ok());
    }
}
