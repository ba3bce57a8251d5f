pub mod conversation;
pub mod domain;
pub mod ports;
pub mod store;

pub use conversation::{Conversation, ConversationError, SendOutcome, SEND_FAILURE_MESSAGE};
pub use domain::{
    DomainError, Feedback, Message, PatientProfile, QuickAction, Role, Session, SessionGroups,
    DEFAULT_TITLE, QUICK_ACTIONS,
};
pub use ports::{
    ChatReply, ChatRequest, ChatService, KeyValueStore, PortError, PortResult, ProfileService,
};
pub use store::{MemoryStore, SessionStore};
