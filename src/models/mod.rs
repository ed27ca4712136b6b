pub mod contact;
pub mod event;

pub use contact::{ContactMessage, MailLogEntry};
pub use event::{EventType, InboundEvent, PersistedEvent, StoredEvent, UnknownEventType};
