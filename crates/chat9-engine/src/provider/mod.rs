//! Chat engine provider implementations.

mod completion;
mod mock;

pub use completion::{CompletionChatEngine, CompletionProvider, CompletionSettings};
pub use mock::{MockConfig, MockProvider, RecordedChat};

/// Tracing target for provider operations.
pub const TRACING_TARGET: &str = "chat9_engine::provider";

/// Splits generated text into word-sized fragments, keeping whitespace
/// attached to the preceding word so that concatenation restores the text.
pub(crate) fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_whitespace = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            in_whitespace = true;
        } else {
            if in_whitespace && current.chars().any(|c| !c.is_whitespace()) {
                tokens.push(std::mem::take(&mut current));
            }
            in_whitespace = false;
        }
        current.push(ch);
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_tokens_round_trips() {
        let text = "  Hello there,\nworld  ";
        let tokens = split_tokens(text);
        assert_eq!(tokens.concat(), text);
        assert_eq!(tokens, ["  Hello ", "there,\n", "world  "]);
    }

    #[test]
    fn split_tokens_empty() {
        assert!(split_tokens("").is_empty());
    }
}
