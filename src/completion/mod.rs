// Chat-completion service client and the prompts sent to it

pub mod client;
pub mod prompts;

pub use client::{CompletionClient, CompletionRequest};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Pull a JSON object out of model output.
///
/// JSON mode normally returns a bare object, but some models still wrap it
/// in markdown fences or add a sentence before it.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Option<T> {
    debug!(
        "Completion raw response: {}",
        crate::utils::sanitize::truncate(text, 500)
    );

    if let Ok(v) = serde_json::from_str::<T>(text.trim()) {
        return Some(v);
    }

    let stripped = text.replace("```json", "").replace("```", "");
    if let Ok(v) = serde_json::from_str::<T>(stripped.trim()) {
        return Some(v);
    }

    // First balanced {...} block
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let candidate = &text[start..=start + i];
                    return serde_json::from_str::<Value>(candidate)
                        .ok()
                        .and_then(|v| serde_json::from_value(v).ok());
                }
            }
            _ => {}
        }
    }

    None
}
