//! Client side of the control socket, used by the CLI.

use crate::error::{QueueCallError, Result};
use crate::ipc::protocol::{Command, Response};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Sends one command to a running terminal and waits for its response.
///
/// # Errors
/// `IpcConnection` if the terminal is not reachable, `IpcProtocol` if the
/// response is not valid JSON.
pub async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| QueueCallError::IpcConnection {
            message: format!(
                "Failed to connect to {} (is `queuecall run` active?): {}",
                socket_path.display(),
                e
            ),
        })?;

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut command_json = command.to_json().map_err(|e| QueueCallError::IpcProtocol {
        message: format!("Failed to serialize command: {}", e),
    })?;
    command_json.push('\n');

    writer
        .write_all(command_json.as_bytes())
        .await
        .map_err(|e| QueueCallError::IpcConnection {
            message: format!("Failed to write command: {}", e),
        })?;
    writer
        .flush()
        .await
        .map_err(|e| QueueCallError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .await
        .map_err(|e| QueueCallError::IpcConnection {
            message: format!("Failed to read response: {}", e),
        })?;

    Response::from_json(response_line.trim()).map_err(|e| QueueCallError::IpcProtocol {
        message: format!("Failed to deserialize response: {}", e),
    })
}
