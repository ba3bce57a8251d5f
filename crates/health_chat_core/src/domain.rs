//! crates/health_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the chat client.
//! These structs are independent of any storage backend or wire format.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

/// Title every session starts with until its first user message arrives.
pub const DEFAULT_TITLE: &str = "New chat";

/// Display name used when no profile collaborator has answered.
pub const DEFAULT_PATIENT_NAME: &str = "Patient";

const DEFAULT_INITIALS: &str = "PT";

const TITLE_MAX_CHARS: usize = 30;
const TITLE_ELLIPSIS: &str = "…";

const DESCRIPTION_MAX_CHARS: usize = 80;
const DESCRIPTION_CUT_CHARS: usize = 77;
const DESCRIPTION_ELLIPSIS: &str = "...";

const RECENT_WINDOW_DAYS: i64 = 7;

/// Current instant at millisecond precision, matching what the session store can persist.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

//=========================================================================================
// Messages
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A thumbs up / thumbs down rating on an assistant reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Up,
    Down,
}

/// One turn in a conversation. Immutable once appended, except for `feedback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub feedback: Option<Feedback>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now(),
            feedback: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("No message at position {0}")]
    MessageNotFound(usize),
    #[error("Message at position {0} is not an assistant reply")]
    NotAnAssistantMessage(usize),
}

//=========================================================================================
// Sessions
//=========================================================================================

/// A single conversation thread. Every mutation returns a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session with a fresh id and the default title.
    pub fn new() -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::User)
    }

    /// Returns the title this session should carry once `first_user_text` is its
    /// first user message. A session that already has a user message or a
    /// non-default title keeps its current title.
    pub fn derive_title(&self, first_user_text: &str) -> String {
        if !self.has_default_title() || self.first_user_message().is_some() {
            return self.title.clone();
        }
        let text = first_user_text.trim();
        if text.is_empty() {
            return self.title.clone();
        }
        truncate_with_marker(text, TITLE_MAX_CHARS, TITLE_MAX_CHARS, TITLE_ELLIPSIS)
    }

    /// Returns a copy of this session with `message` appended and `updated_at` refreshed.
    pub fn append_message(&self, message: Message) -> Session {
        let mut next = self.clone();
        next.messages.push(message);
        next.updated_at = now();
        next
    }

    /// Short preview of the first user message, used by conversation lists.
    pub fn description(&self) -> String {
        self.first_user_message()
            .map(|m| {
                truncate_with_marker(
                    &m.content,
                    DESCRIPTION_MAX_CHARS,
                    DESCRIPTION_CUT_CHARS,
                    DESCRIPTION_ELLIPSIS,
                )
            })
            .unwrap_or_default()
    }

    /// Case-insensitive match on title or description. A blank query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query)
            || self.description().to_lowercase().contains(&query)
    }

    /// Whether the session was touched within the last seven days.
    pub fn is_recent(&self, now: DateTime<Utc>) -> bool {
        now - self.updated_at <= Duration::days(RECENT_WINDOW_DAYS)
    }

    /// Sets `feedback` on the assistant message at `index`. Giving the same
    /// feedback twice clears it.
    pub fn with_feedback(&self, index: usize, feedback: Feedback) -> Result<Session, DomainError> {
        let message = self
            .messages
            .get(index)
            .ok_or(DomainError::MessageNotFound(index))?;
        if message.role != Role::Assistant {
            return Err(DomainError::NotAnAssistantMessage(index));
        }

        let mut next = self.clone();
        let target = &mut next.messages[index];
        target.feedback = if target.feedback == Some(feedback) {
            None
        } else {
            Some(feedback)
        };
        Ok(next)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Sessions split for the conversation sidebar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionGroups {
    pub recent: Vec<Session>,
    pub older: Vec<Session>,
}

/// Splits sessions by recency, preserving their order.
pub fn group_by_recency<'a>(
    sessions: impl IntoIterator<Item = &'a Session>,
    now: DateTime<Utc>,
) -> SessionGroups {
    let mut groups = SessionGroups::default();
    for session in sessions {
        if session.is_recent(now) {
            groups.recent.push(session.clone());
        } else {
            groups.older.push(session.clone());
        }
    }
    groups
}

fn truncate_with_marker(text: &str, max_chars: usize, keep_chars: usize, marker: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(keep_chars).collect();
    out.push_str(marker);
    out
}

//=========================================================================================
// Patient profile & quick actions
//=========================================================================================

/// What the profile endpoints told us about the signed-in patient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientProfile {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl PatientProfile {
    /// Greeting name: the profile name with its first letter upper-cased, or "Patient".
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => capitalize(name),
            _ => DEFAULT_PATIENT_NAME.to_string(),
        }
    }

    /// Up to two upper-case initials for the avatar, "PT" when unknown.
    pub fn initials(&self) -> String {
        let initials: String = self
            .name
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect();
        if initials.is_empty() {
            DEFAULT_INITIALS.to_string()
        } else {
            initials
        }
    }
}

/// The user part of an email address, when there is one.
pub fn name_from_email(email: &str) -> Option<String> {
    let local = email.split('@').next().unwrap_or_default().trim();
    if local.is_empty() {
        None
    } else {
        Some(local.to_string())
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A shortcut shown next to the conversation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAction {
    pub id: &'static str,
    pub label: &'static str,
}

pub const QUICK_ACTIONS: [QuickAction; 2] = [
    QuickAction {
        id: "book-appointment",
        label: "Book Appointment",
    },
    QuickAction {
        id: "refill-prescription",
        label: "Refill Prescription",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_empty_with_default_title() {
        let session = Session::new();
        assert!(session.messages.is_empty());
        assert_eq!(session.title, DEFAULT_TITLE);
        assert_eq!(session.created_at, session.updated_at);
        assert_ne!(Session::new().id, session.id);
    }

    #[test]
    fn title_uses_short_first_message_verbatim() {
        let session = Session::new();
        assert_eq!(session.derive_title("  Hello  "), "Hello");
    }

    #[test]
    fn title_is_truncated_to_thirty_chars_with_ellipsis() {
        let session = Session::new();
        let text = "I have had a headache for three days now";
        let title = session.derive_title(text);
        assert_eq!(title, format!("{}…", &text[..30]));
        assert_eq!(title.chars().count(), 31);

        let exactly_thirty = "a".repeat(30);
        assert_eq!(session.derive_title(&exactly_thirty), exactly_thirty);
    }

    #[test]
    fn title_truncation_counts_characters_not_bytes() {
        let session = Session::new();
        let text = "é".repeat(40);
        assert_eq!(session.derive_title(&text), format!("{}…", "é".repeat(30)));
    }

    #[test]
    fn title_is_never_rederived_after_first_user_message() {
        let session = Session::new();
        let mut first = session.append_message(Message::user("Hello"));
        first.title = session.derive_title("Hello");
        assert_eq!(first.derive_title("Something else"), "Hello");

        // Even if the first message happened to equal the default title.
        let mut odd = session.append_message(Message::user(DEFAULT_TITLE));
        odd.title = session.derive_title(DEFAULT_TITLE);
        assert_eq!(odd.derive_title("Later question"), DEFAULT_TITLE);
    }

    #[test]
    fn append_returns_new_value_and_leaves_input_untouched() {
        let session = Session::new();
        let next = session.append_message(Message::user("Hi"));
        assert!(session.messages.is_empty());
        assert_eq!(next.messages.len(), 1);
        assert_eq!(next.id, session.id);
        assert!(next.updated_at >= session.updated_at);
    }

    #[test]
    fn description_reads_first_user_message_only() {
        let session = Session::new()
            .append_message(Message::assistant("Welcome"))
            .append_message(Message::user("first"))
            .append_message(Message::user("second"));
        assert_eq!(session.description(), "first");

        let long = "x".repeat(81);
        let session = Session::new().append_message(Message::user(long));
        assert_eq!(session.description(), format!("{}...", "x".repeat(77)));
        assert_eq!(Session::new().description(), "");
    }

    #[test]
    fn feedback_toggles_on_assistant_messages() {
        let session = Session::new()
            .append_message(Message::user("Hello"))
            .append_message(Message::assistant("Hi there"));

        let up = session.with_feedback(1, Feedback::Up).unwrap();
        assert_eq!(up.messages[1].feedback, Some(Feedback::Up));
        assert_eq!(session.messages[1].feedback, None);

        let down = up.with_feedback(1, Feedback::Down).unwrap();
        assert_eq!(down.messages[1].feedback, Some(Feedback::Down));

        let cleared = down.with_feedback(1, Feedback::Down).unwrap();
        assert_eq!(cleared.messages[1].feedback, None);
        assert_eq!(cleared.title, session.title);
    }

    #[test]
    fn feedback_rejects_user_messages_and_bad_positions() {
        let session = Session::new().append_message(Message::user("Hello"));
        assert_eq!(
            session.with_feedback(0, Feedback::Up),
            Err(DomainError::NotAnAssistantMessage(0))
        );
        assert_eq!(
            session.with_feedback(5, Feedback::Up),
            Err(DomainError::MessageNotFound(5))
        );
    }

    #[test]
    fn search_matches_title_and_description_case_insensitively() {
        let mut session = Session::new().append_message(Message::user("Refill my Lisinopril"));
        session.title = "Prescriptions".to_string();
        assert!(session.matches_query("prescr"));
        assert!(session.matches_query("LISINOPRIL"));
        assert!(session.matches_query("   "));
        assert!(!session.matches_query("allergy"));
    }

    #[test]
    fn sessions_are_grouped_by_seven_day_window() {
        let now = now();
        let fresh = Session::new();
        let mut stale = Session::new();
        stale.updated_at = now - Duration::days(8);

        let groups = group_by_recency([&fresh, &stale], now);
        assert_eq!(groups.recent, vec![fresh]);
        assert_eq!(groups.older, vec![stale]);
    }

    #[test]
    fn profile_display_defaults_and_capitalizes() {
        assert_eq!(PatientProfile::default().display_name(), "Patient");
        assert_eq!(PatientProfile::default().initials(), "PT");

        let profile = PatientProfile {
            name: Some("jane doe".to_string()),
            email: None,
        };
        assert_eq!(profile.display_name(), "Jane doe");
        assert_eq!(profile.initials(), "JD");
    }

    #[test]
    fn email_local_part_is_used_as_name() {
        assert_eq!(name_from_email("jane@example.com").as_deref(), Some("jane"));
        assert_eq!(name_from_email("@example.com"), None);
    }
}
