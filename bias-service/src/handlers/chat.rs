use crate::dtos::{
    ChatDetailResponse, ChatRequest, ChatResponse, DeleteChatResponse, HistoryEntry,
    NewChatResponse,
};
use crate::middleware::AuthUser;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .chats
        .run_turn(
            &claims.user_id,
            &req.chat_id,
            &req.message,
            req.file_url.as_deref(),
        )
        .await?;

    Ok(Json(ChatResponse::from(outcome)))
}

pub async fn new_chat(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let chat_id = state.chats.new_chat(&claims.user_id).await?;
    Ok(Json(NewChatResponse { chat_id }))
}

pub async fn get_chat(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let chat = state.chats.get_chat(&claims.user_id, &chat_id).await?;
    Ok(Json(ChatDetailResponse::from(chat)))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.chats.delete_chat(&claims.user_id, &chat_id).await?;
    Ok(Json(DeleteChatResponse { success: true }))
}

pub async fn history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let entries: Vec<HistoryEntry> = state
        .chats
        .history(&claims.user_id)
        .await?
        .into_iter()
        .map(HistoryEntry::from)
        .collect();

    Ok(Json(entries))
}
