//! Speech through an external synthesizer process (eSpeak NG, Piper wrapper, say).

use crate::error::{QueueCallError, Result};
use crate::speech::SpeechOutput;
use std::process::Stdio;
use tokio::process::Command;

/// Runs `command args... <text>` once per utterance.
///
/// The child is killed when the `speak` future is dropped, which is how the
/// sequencer cancels speech on shutdown or timeout.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    command: String,
    args: Vec<String>,
}

impl CommandSpeech {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait::async_trait]
impl SpeechOutput for CommandSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    QueueCallError::SpeechEngineNotFound {
                        engine: self.command.clone(),
                    }
                } else {
                    QueueCallError::SpeechFailed {
                        message: format!("Failed to execute {}: {}", self.command, e),
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(QueueCallError::SpeechFailed {
                message: format!(
                    "{} failed with status {:?}: {}",
                    self.command,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        Ok(())
    }

    fn engine_name(&self) -> &str {
        &self.command
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_successful_command() {
        let speech = CommandSpeech::new("true", vec![]);
        assert!(speech.speak("Nomor resep 7").await.is_ok());
    }

    #[tokio::test]
    async fn test_text_is_passed_as_last_argument() {
        // sh -c 'script' $0 $1 : the text lands in $1
        let speech = CommandSpeech::new(
            "sh",
            vec![
                "-c".to_string(),
                "test \"$1\" = 'hello there' || exit 3".to_string(),
                "speak".to_string(),
            ],
        );
        assert!(speech.speak("hello there").await.is_ok());
        assert!(speech.speak("something else").await.is_err());
    }

    #[tokio::test]
    async fn test_failing_command_reports_stderr() {
        let speech = CommandSpeech::new(
            "sh",
            vec!["-c".to_string(), "echo no audio device >&2; exit 1".to_string()],
        );
        match speech.speak("x").await {
            Err(QueueCallError::SpeechFailed { message }) => {
                assert!(message.contains("no audio device"), "got: {}", message);
            }
            other => panic!("Expected SpeechFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_engine() {
        let speech = CommandSpeech::new("queuecall-no-such-tts-engine", vec![]);
        match speech.speak("x").await {
            Err(QueueCallError::SpeechEngineNotFound { engine }) => {
                assert_eq!(engine, "queuecall-no-such-tts-engine");
            }
            other => panic!("Expected SpeechEngineNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropping_future_cancels_utterance() {
        let speech = CommandSpeech::new("sleep", vec![]);
        let result = tokio::time::timeout(Duration::from_millis(100), speech.speak("30")).await;
        assert!(result.is_err(), "sleep 30 should still be running");
    }

    #[test]
    fn test_engine_name_is_command() {
        let speech = CommandSpeech::new("espeak-ng", vec!["-v".to_string(), "id".to_string()]);
        assert_eq!(speech.engine_name(), "espeak-ng");
        assert_eq!(speech.args(), ["-v", "id"]);
    }
}
