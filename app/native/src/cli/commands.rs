//! CLI command definitions using Clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use super::output;
use crate::error::RxdeskError;
use crate::modules::desk::{AvatarUrl, PersistentAction, SuppressMode};
use crate::utils::ipc_socket::{self, IpcRequest};
use crate::{config, serve};

/// Application version from Cargo.toml.
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// rxdesk - sticky notes, one window each.
#[derive(Parser, Debug)]
#[command(name = "rxdesk")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Use this configuration file instead of searching the default locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print raw JSON responses.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Open the current workspace and serve it until `rxdesk exit`.
    Serve {
        /// Store snapshot file. Overrides `storage.path` from the config.
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,

        /// Create a workspace if the store has none.
        #[arg(long)]
        init: bool,
    },

    /// Show the current workspace and its windows.
    Status,

    /// Print an avatar document.
    Avatar {
        #[arg(value_name = "URL")]
        url: AvatarUrl,
    },

    /// Raise a note above every other note of its workspace.
    Front {
        #[arg(value_name = "URL")]
        url: AvatarUrl,

        /// Also restack the native windows to match the stored order.
        #[arg(long)]
        rearrange: bool,
    },

    /// Lower a note below every other note of its workspace.
    Back {
        #[arg(value_name = "URL")]
        url: AvatarUrl,
    },

    /// Close a note's window and delete the note from its workspace.
    Delete {
        #[arg(value_name = "URL")]
        url: AvatarUrl,
    },

    /// Focus a note's window.
    Focus {
        #[arg(value_name = "URL")]
        url: AvatarUrl,

        /// Re-take focus while silencing focus events.
        #[arg(long, value_enum, value_name = "MODE")]
        suppress: Option<SuppressArg>,
    },

    /// Blur a note's window.
    Blur {
        #[arg(value_name = "URL")]
        url: AvatarUrl,
    },

    /// Move a note's window.
    Move {
        #[arg(value_name = "URL")]
        url: AvatarUrl,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },

    /// Resize a note's window. Sizes below the minimum are raised to it.
    Resize {
        #[arg(value_name = "URL")]
        url: AvatarUrl,
        width: i32,
        height: i32,
    },

    /// Dispatch a persistent action given as JSON.
    #[command(after_long_help = r#"Example:
  rxdesk dispatch '{"type":"position-update","url":"rxdesktop://local/ws/0/c1/a","payload":{"x":10,"y":20}}'"#)]
    Dispatch {
        #[arg(value_name = "JSON")]
        action: String,
    },

    /// Close every window and open another workspace.
    Workspace {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Close every window and stop the desk.
    Exit,

    /// Output the configuration JSON Schema.
    Schema,
}

/// Which focus events `focus --suppress` silences.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuppressArg {
    /// The window's own blur and focus are silent as well.
    Events,
    /// Only other windows are silenced.
    Focus,
}

impl From<SuppressArg> for SuppressMode {
    fn from(arg: SuppressArg) -> Self {
        match arg {
            SuppressArg::Events => Self::Events,
            SuppressArg::Focus => Self::FocusEvent,
        }
    }
}

impl Cli {
    /// Executes the parsed command.
    ///
    /// # Errors
    ///
    /// Returns an error if the desk is not running, rejects the request, or
    /// `serve` fails to start.
    pub fn execute(self) -> Result<(), RxdeskError> {
        if let Some(path) = self.config {
            config::set_custom_config_path(path);
        }

        let request = match self.command {
            Commands::Serve { store, init } => {
                crate::init_tracing();
                return serve(store, init);
            }
            Commands::Schema => {
                println!("{}", config::print_schema());
                return Ok(());
            }
            Commands::Status => IpcRequest::Status,
            Commands::Avatar { url } => IpcRequest::Avatar { url },
            Commands::Front { url, rearrange } => IpcRequest::BringToFront { url, rearrange },
            Commands::Back { url } => IpcRequest::SendToBack { url },
            Commands::Delete { url } => IpcRequest::DeleteAvatar { url },
            Commands::Focus { url, suppress: None } => IpcRequest::Focus { url },
            Commands::Focus { url, suppress: Some(mode) } => {
                IpcRequest::BlurAndFocus { url, mode: mode.into() }
            }
            Commands::Blur { url } => IpcRequest::Blur { url },
            Commands::Move { url, x, y } => IpcRequest::SetWindowPosition { url, x, y },
            Commands::Resize { url, width, height } => {
                IpcRequest::SetWindowSize { url, width, height }
            }
            Commands::Dispatch { action } => IpcRequest::DispatchAction {
                action: parse_action(&action)?,
            },
            Commands::Workspace { id } => IpcRequest::SwitchWorkspace { id },
            Commands::Exit => IpcRequest::Exit,
        };

        let is_status = matches!(request, IpcRequest::Status);
        let response = ipc_socket::send_request(&request)?;
        output::print_response(response, self.json, is_status)
    }
}

fn parse_action(raw: &str) -> Result<PersistentAction, RxdeskError> {
    serde_json::from_str(raw)
        .map_err(|err| RxdeskError::InvalidArguments(format!("Invalid action: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::desk::ActionKind;

    const URL: &str = "rxdesktop://local/ws/w1/c1/a";

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["rxdesk"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_serve_flags() {
        let cli = parse(&["serve", "--store", "/tmp/store.json", "--init"]);
        match cli.command {
            Commands::Serve { store, init } => {
                assert_eq!(store, Some(PathBuf::from("/tmp/store.json")));
                assert!(init);
            }
            other => panic!("Expected serve, got {other:?}"),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = parse(&["status", "--config", "/tmp/rxdesk.jsonc", "--json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/rxdesk.jsonc")));
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_front_parses_url_and_rearrange() {
        let cli = parse(&["front", URL, "--rearrange"]);
        match cli.command {
            Commands::Front { url, rearrange } => {
                assert_eq!(url.workspace_id(), "w1");
                assert!(rearrange);
            }
            other => panic!("Expected front, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_url_is_rejected() {
        let result = Cli::try_parse_from(["rxdesk", "back", "http://example.com"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_parses_url() {
        let cli = parse(&["delete", URL]);
        assert!(matches!(cli.command, Commands::Delete { url } if url.instance() == "a"));
    }

    #[test]
    fn test_move_accepts_negative_coordinates() {
        let cli = parse(&["move", URL, "-20", "-5"]);
        assert!(matches!(cli.command, Commands::Move { x: -20, y: -5, .. }));
    }

    #[test]
    fn test_focus_suppress_modes() {
        let cli = parse(&["focus", URL, "--suppress", "focus"]);
        let Commands::Focus { suppress: Some(mode), .. } = cli.command else {
            panic!("Expected focus with suppress");
        };
        assert_eq!(SuppressMode::from(mode), SuppressMode::FocusEvent);

        let cli = parse(&["focus", URL]);
        assert!(matches!(cli.command, Commands::Focus { suppress: None, .. }));
    }

    #[test]
    fn test_parse_action_accepts_wire_format() {
        let action = parse_action(
            r#"{"type":"depth-update","url":"rxdesktop://local/ws/w1/c1/a","payload":{"z":4}}"#,
        )
        .unwrap();
        assert!(matches!(action.kind, ActionKind::DepthUpdate(depth) if depth.z == 4));

        let err = parse_action("{}").unwrap_err();
        assert!(matches!(err, RxdeskError::InvalidArguments(_)));
    }
}
