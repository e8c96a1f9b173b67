//! Domain models persisted by the bias service.

pub mod chat;
pub mod report;
pub mod user;

pub use chat::{ChatSession, Message, Role};
pub use report::{BiasReport, ReportFindings};
pub use user::UserIdentity;
