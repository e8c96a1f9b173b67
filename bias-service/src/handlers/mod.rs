pub mod auth;
pub mod chat;
pub mod health;
pub mod report;
pub mod upload;

pub use auth::{login, me, signup};
pub use chat::{delete_chat, get_chat, history, new_chat, send_message};
pub use health::{health_check, metrics_endpoint, readiness_check, root};
pub use report::download_report;
pub use upload::upload_file;
