pub mod openai;

pub use openai::OpenAICompleter;

use crate::error::Result;
use async_trait::async_trait;

/// Text generation model used to answer questions over retrieved context
#[async_trait]
pub trait Completer: Send + Sync {
    /// Run one completion with a system instruction and a single user turn
    async fn complete(&self, system_instruction: &str, user_message: &str) -> Result<String>;
}
