pub mod auth;
pub mod chat;
pub mod report;
pub mod upload;

pub use auth::{AuthResponse, LoginRequest, MeResponse, SignupRequest};
pub use chat::{
    ChatDetailResponse, ChatRequest, ChatResponse, DeleteChatResponse, HistoryEntry,
    NewChatResponse,
};
pub use report::ReportDownloadRequest;
pub use upload::UploadResponse;
