//! UI-agnostic session state types
//!
//! Everything a screen needs to know about the current session lives on
//! [`Session`], which the UI owns and hands to each view by reference.

use serde::{Deserialize, Serialize};

use crate::catalog::Listing;
use crate::generation::GenerationClient;
use crate::ledger::PurchaseLedger;

/// A chat message in a listing demo conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Demo conversation with one listing. Dropped when the user navigates away.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a user turn and return the history that preceded it.
    pub fn open_turn(&mut self, text: &str) -> Vec<ChatMessage> {
        let prior = self.messages.clone();
        self.messages.push(ChatMessage::user(text));
        prior
    }

    /// Append the reply to the turn opened last.
    pub fn close_turn(&mut self, reply: String) -> &ChatMessage {
        self.messages.push(ChatMessage::assistant(reply));
        &self.messages[self.messages.len() - 1]
    }

    /// Send `text` to the listing's persona and append both turns.
    pub async fn exchange(
        &mut self,
        client: &GenerationClient,
        listing: &Listing,
        text: &str,
    ) -> &ChatMessage {
        let prior = self.open_turn(text);
        let reply = client
            .converse(&listing.name, &listing.persona_summary(), &prior, text)
            .await;
        self.close_turn(reply)
    }
}

/// Display perspective. Changes what the dashboard shows, grants nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Buyer,
    Creator,
}

impl UserRole {
    pub fn toggled(&self) -> Self {
        match self {
            UserRole::Buyer => UserRole::Creator,
            UserRole::Creator => UserRole::Buyer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Buyer => "buyer",
            UserRole::Creator => "creator",
        }
    }
}

/// Per-session state shared by every screen
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub ledger: PurchaseLedger,
    pub role: UserRole,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_role(&mut self) -> UserRole {
        self.role = self.role.toggled();
        tracing::debug!(role = self.role.as_str(), "display mode switched");
        self.role
    }

    pub fn is_owned(&self, id: &str) -> bool {
        self.ledger.has(id)
    }

    pub fn record_purchase(&mut self, id: &str) -> bool {
        self.ledger.record(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);

        let parsed: ChatMessage =
            serde_json::from_str(r#"{"role":"user","content":"hello"}"#).unwrap();
        assert_eq!(parsed, ChatMessage::user("hello"));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let parsed: Result<ChatMessage, _> =
            serde_json::from_str(r#"{"role":"system","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_open_turn_returns_prior_history() {
        let mut conversation = Conversation::new();
        assert!(conversation.open_turn("one").is_empty());
        conversation.close_turn("first".to_string());

        let prior = conversation.open_turn("two");
        assert_eq!(prior, vec![ChatMessage::user("one"), ChatMessage::assistant("first")]);
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.close_turn("second".to_string()).role, ChatRole::Assistant);
    }

    #[test]
    fn test_toggle_role() {
        let mut session = Session::new();
        assert_eq!(session.role, UserRole::Buyer);
        assert_eq!(session.toggle_role(), UserRole::Creator);
        assert_eq!(session.toggle_role(), UserRole::Buyer);
    }

    #[test]
    fn test_session_purchase_goes_through_ledger() {
        let mut session = Session::new();
        assert!(!session.is_owned("1"));
        assert!(session.record_purchase("1"));
        assert!(!session.record_purchase("1"));
        assert!(session.is_owned("1"));
        assert_eq!(session.ledger.len(), 1);
    }
}
