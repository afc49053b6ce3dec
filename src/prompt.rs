//! Operator prompt for secrets that could not be resolved any other way.

use async_trait::async_trait;

use crate::config::SecretKey;

/// Asks the operator for a secret value.
///
/// Returning `None` means the operator declined or no answer was given.
#[async_trait]
pub trait SecretPrompt: Send + Sync {
    async fn prompt_for_secret(&self, key: SecretKey, message: &str) -> Option<String>;
}

/// The message shown when asking for the attendance webhook.
pub const WEBHOOK_PROMPT: &str = "Enter your Google Apps Script URL for attendance tracking:\n\
     (Leave empty to disable attendance tracking)";
