//! Sessions and conversational modes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use super::message::{Message, MessageKind, Role};
use super::retrieval::RetrievalResult;

/// Number of characters of the first user message used as the session title.
pub const TITLE_MAX_CHARS: usize = 50;

/// A named persona/dataset scope selecting system instructions and tools.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
pub enum AppMode {
    #[default]
    #[serde(rename = "Business Analyst Agent")]
    #[strum(to_string = "Business Analyst Agent", serialize = "agent")]
    BusinessAgent,
    #[serde(rename = "Codebase")]
    #[strum(to_string = "Codebase", serialize = "codebase")]
    Codebase,
    #[serde(rename = "Research Papers")]
    #[strum(to_string = "Research Papers", serialize = "research")]
    Research,
    #[serde(rename = "Support Tickets")]
    #[strum(to_string = "Support Tickets", serialize = "support")]
    Support,
    #[serde(rename = "Web Search")]
    #[strum(to_string = "Web Search", serialize = "web")]
    WebSearch,
    #[serde(rename = "Google Drive")]
    #[strum(to_string = "Google Drive", serialize = "drive")]
    GoogleDrive,
    #[serde(rename = "Your Documents")]
    #[strum(to_string = "Your Documents", serialize = "custom")]
    Custom,
}

impl AppMode {
    /// Tool declarations are only offered to the model in the agentic mode.
    pub fn offers_tools(self) -> bool {
        matches!(self, Self::BusinessAgent)
    }
}

/// Title of every freshly created session, whatever its mode.
pub const NEW_SESSION_TITLE: &str = "New Agent Chat";

/// A conversation: an ordered message history in one mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub mode: AppMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_dataset: Option<Vec<RetrievalResult>>,
}

impl Session {
    pub fn new(mode: AppMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: NEW_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            mode,
            custom_dataset: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a user message; the first one also names the session.
    pub fn push_user(&mut self, query: &str, image: Option<String>) {
        if self.messages.is_empty() {
            self.title = derive_title(query);
        }
        self.messages.push(Message::user(query, image));
    }

    /// Switch mode in place. Only meaningful while the session is empty.
    pub fn switch_mode(&mut self, mode: AppMode) {
        self.mode = mode;
        self.title = format!("New {mode} Chat");
    }

    /// Remove the message with the given id, if it is still present.
    pub fn remove_message(&mut self, id: &str) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    /// Remove every transient placeholder.
    pub fn clear_placeholders(&mut self) {
        self.messages.retain(|m| !m.is_placeholder());
    }

    /// The history as it should be sent to the model (placeholders excluded).
    pub fn model_history(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !m.is_placeholder())
            .cloned()
            .collect()
    }

    /// The most recent model-authored text message.
    pub fn last_answer(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| {
            m.role == Role::Model && m.kind() == MessageKind::Text
        })
    }
}

/// First [`TITLE_MAX_CHARS`] characters of the query.
pub fn derive_title(query: &str) -> String {
    query.chars().take(TITLE_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn mode_serializes_as_display_name() {
        let json = serde_json::to_value(AppMode::BusinessAgent).unwrap();
        assert_eq!(json, "Business Analyst Agent");
        assert_eq!(AppMode::Custom.to_string(), "Your Documents");
        assert_eq!(AppMode::from_str("support").unwrap(), AppMode::Support);
        assert_eq!(AppMode::from_str("Google Drive").unwrap(), AppMode::GoogleDrive);
    }

    #[test]
    fn only_agent_mode_offers_tools() {
        assert!(AppMode::BusinessAgent.offers_tools());
        assert!(!AppMode::Codebase.offers_tools());
    }

    #[test]
    fn first_user_message_sets_title() {
        let mut session = Session::new(AppMode::BusinessAgent);
        assert_eq!(session.title, "New Agent Chat");
        let long = "Summarize every login issue reported across all regions during the third quarter";
        session.push_user(long, None);
        assert_eq!(session.title.chars().count(), 50);
        assert!(long.starts_with(&session.title));

        session.push_user("second question", None);
        assert!(long.starts_with(&session.title));
    }

    #[test]
    fn switch_mode_retitles() {
        let mut session = Session::new(AppMode::BusinessAgent);
        session.switch_mode(AppMode::Research);
        assert_eq!(session.title, "New Research Papers Chat");
    }

    #[test]
    fn new_sessions_share_one_title() {
        assert_eq!(Session::new(AppMode::Support).title, NEW_SESSION_TITLE);
        assert_eq!(Session::new(AppMode::Research).title, "New Agent Chat");
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = Session::new(AppMode::Support);
        session.push_user("hello", Some("data:image/png;base64,AAAA".into()));
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"mode\":\"Support Tickets\""));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
