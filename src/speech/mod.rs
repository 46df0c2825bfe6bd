//! Speech output adapters.
//!
//! The sequencer is the only caller of [`SpeechOutput::speak`], and it never
//! has more than one call outstanding.

pub mod command;
pub mod mock;

pub use command::CommandSpeech;
pub use mock::MockSpeech;

use crate::error::Result;
use std::sync::Arc;

/// Trait for text-to-speech output.
///
/// This trait allows swapping implementations (real engine vs mock).
/// Dropping the returned future must cancel the utterance.
#[async_trait::async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak `text`, resolving once the engine has finished or failed.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Engine name for logs.
    fn engine_name(&self) -> &str;
}

/// Implement SpeechOutput for Arc<T> to share one engine.
#[async_trait::async_trait]
impl<T: SpeechOutput + ?Sized> SpeechOutput for Arc<T> {
    async fn speak(&self, text: &str) -> Result<()> {
        (**self).speak(text).await
    }

    fn engine_name(&self) -> &str {
        (**self).engine_name()
    }
}

/// Speech output that only logs, for terminals without audio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeech;

#[async_trait::async_trait]
impl SpeechOutput for SilentSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        tracing::info!(text = text, "announcement (speech disabled)");
        Ok(())
    }

    fn engine_name(&self) -> &str {
        "silent"
    }
}
