mod abbrev;
mod command;
mod openai;
mod traits;

pub use abbrev::AbbreviationMap;
pub use command::{CommandTranslator, DEFAULT_COMMAND_TIMEOUT_SECS};
pub use openai::OpenAiTranslator;
pub use traits::{Translator, TranslatorInfo};

use crate::config::TranslatorConfig;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Create a translator from configuration
///
/// A configured shell command takes precedence over the HTTP backend.
pub fn create_translator(config: &TranslatorConfig) -> Result<Arc<dyn Translator>> {
    if let Some(command) = config.command.as_deref().filter(|c| !c.trim().is_empty()) {
        return Ok(Arc::new(CommandTranslator::new(
            command,
            Duration::from_secs(config.command_timeout_secs),
        )));
    }

    let translator = OpenAiTranslator::new(
        config.api_base.clone(),
        config.api_key.clone(),
        config.model.clone(),
        config.retry_count,
        config.retry_delay_ms,
    )?
    .with_batch_size(config.batch_size);

    Ok(Arc::new(translator))
}
