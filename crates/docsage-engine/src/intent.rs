//! Free-text intent classification.
//!
//! The classification oracle's reply is treated as a single trusted token:
//! exactly "Greeting" or "Question" dispatches; any other value routes to
//! the generic fallback.

use docsage_core::error::Result;
use docsage_core::traits::CompletionOracle;
use docsage_core::types::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Question,
    Other,
}

impl Intent {
    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "Greeting" => Intent::Greeting,
            "Question" => Intent::Question,
            _ => Intent::Other,
        }
    }
}

/// Classify one fresh-session free-text message.
pub async fn classify(oracle: &dyn CompletionOracle, text: &str) -> Result<Intent> {
    let messages = [
        ChatMessage::system(
            "Classify the user's message. Reply with exactly one word: \
             Greeting if the message is a salutation or opening, \
             Question if it asks something about a document.",
        ),
        ChatMessage::user(text),
    ];
    let response = oracle.complete(&messages).await?;
    Ok(Intent::parse(&response.content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trusted_tokens() {
        assert_eq!(Intent::parse("Greeting"), Intent::Greeting);
        assert_eq!(Intent::parse(" Question \n"), Intent::Question);
    }

    #[test]
    fn test_parse_anything_else_is_other() {
        assert_eq!(Intent::parse("greeting"), Intent::Other);
        assert_eq!(Intent::parse("QUESTION"), Intent::Other);
        assert_eq!(Intent::parse("Maybe a question?"), Intent::Other);
        assert_eq!(Intent::parse(""), Intent::Other);
    }
}
