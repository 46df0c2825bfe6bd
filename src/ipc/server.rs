//! Async Unix socket server for the local control socket.

use crate::error::{QueueCallError, Result};
use crate::ipc::protocol::{Command, Response};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

/// Handler trait for processing control commands.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Command) -> Response;
}

#[async_trait::async_trait]
impl<T: CommandHandler + ?Sized> CommandHandler for Arc<T> {
    async fn handle(&self, command: Command) -> Response {
        (**self).handle(command).await
    }
}

/// Control socket server. One JSON line in, one JSON line out per connection.
pub struct IpcServer {
    socket_path: PathBuf,
    shutdown: watch::Sender<bool>,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            socket_path,
            shutdown,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Default socket path based on XDG_RUNTIME_DIR, or `/tmp/queuecall-<uid>.sock`.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR")
            && !xdg_runtime.is_empty()
        {
            PathBuf::from(xdg_runtime).join("queuecall.sock")
        } else {
            // SAFETY: getuid has no preconditions and cannot fail.
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/queuecall-{}.sock", uid))
        }
    }

    /// Binds the socket, replacing a stale socket file.
    pub fn bind(&self) -> Result<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| QueueCallError::IpcSocket {
                message: format!("Failed to remove existing socket: {}", e),
            })?;
        }

        UnixListener::bind(&self.socket_path).map_err(|e| QueueCallError::IpcSocket {
            message: format!("Failed to bind to {}: {}", self.socket_path.display(), e),
        })
    }

    /// Serves connections until [`IpcServer::stop`] is called.
    pub async fn serve<H>(&self, listener: UnixListener, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        let handler = Arc::new(handler);
        let mut shutdown = self.shutdown.subscribe();
        tracing::info!(socket = %self.socket_path.display(), "control socket listening");

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _) = accepted.map_err(|e| QueueCallError::IpcConnection {
                        message: format!("Failed to accept connection: {}", e),
                    })?;
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            tracing::warn!(error = %e, "control client failed");
                        }
                    });
                }
                _ = shutdown.changed() => {}
            }
        }

        Ok(())
    }

    /// Binds and serves.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        let listener = self.bind()?;
        self.serve(listener, handler).await
    }

    /// Stops accepting connections and removes the socket file.
    pub fn stop(&self) -> Result<()> {
        self.shutdown.send_replace(true);

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| QueueCallError::IpcSocket {
                message: format!("Failed to remove socket file: {}", e),
            })?;
        }

        Ok(())
    }
}

async fn handle_client<H>(stream: UnixStream, handler: Arc<H>) -> Result<()>
where
    H: CommandHandler,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader
        .read_line(&mut line)
        .await
        .map_err(|e| QueueCallError::IpcConnection {
            message: format!("Failed to read from client: {}", e),
        })?;

    let response = match Command::from_json(line.trim()) {
        Ok(command) => {
            tracing::debug!(?command, "control command");
            handler.handle(command).await
        }
        Err(e) => Response::error(format!("Invalid command: {}", e)),
    };

    let mut response_json = response.to_json().map_err(|e| QueueCallError::IpcProtocol {
        message: format!("Failed to serialize response: {}", e),
    })?;
    response_json.push('\n');

    writer
        .write_all(response_json.as_bytes())
        .await
        .map_err(|e| QueueCallError::IpcConnection {
            message: format!("Failed to write to client: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| QueueCallError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    Ok(())
}
