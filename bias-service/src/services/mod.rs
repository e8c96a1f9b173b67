pub mod chat;
pub mod chat_locks;
pub mod database;
pub mod extractor;
pub mod identity;
pub mod metrics;
pub mod model_reply;
pub mod providers;
pub mod reports;
pub mod storage;
pub mod token;

pub use chat::{ChatService, TurnOutcome};
pub use database::{ChatStore, ChatSummary, MongoChatStore};
pub use identity::{IdentityProvider, SupabaseIdentityProvider};
pub use model_reply::ModelReplyService;
pub use storage::{LocalStorage, ObjectStore, SupabaseStorage};
pub use token::{Claims, TokenService};
