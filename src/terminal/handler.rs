//! Control socket command handler for a running terminal.

use crate::ipc::protocol::{Command, Response};
use crate::ipc::server::CommandHandler;
use crate::terminal::TerminalView;

pub struct TerminalCommandHandler {
    view: TerminalView,
}

impl TerminalCommandHandler {
    pub fn new(view: TerminalView) -> Self {
        Self { view }
    }
}

#[async_trait::async_trait]
impl CommandHandler for TerminalCommandHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Status => Response::Status(Box::new(self.view.status())),
            Command::AutoScroll { enabled } => match self.view.set_auto_scroll(enabled) {
                Ok(()) => {
                    tracing::info!(enabled, "auto-scroll toggled");
                    Response::Ok
                }
                Err(e) => Response::error(e.to_string()),
            },
            Command::Shutdown => {
                self.view.request_shutdown();
                Response::Ok
            }
        }
    }
}
