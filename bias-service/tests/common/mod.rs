#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use bias_service::models::{BiasReport, ChatSession, UserIdentity};
use bias_service::services::providers::{
    FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider,
};
use bias_service::services::{
    ChatService, ChatStore, ChatSummary, IdentityProvider, ModelReplyService, ObjectStore,
    TokenService,
};
use bias_service::startup::{build_router, AppState, HttpSettings};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::Value;
use service_core::error::AppError;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const FILES_BASE_URL: &str = "http://files.test/public";

pub const START: &str = "---BIAS_REPORT_START---";
pub const END: &str = "---BIAS_REPORT_END---";

/// Model reply with a report block appended.
pub fn reply_with_report(preface: &str, report_json: &str) -> String {
    format!("{}\n\n{}\n{}\n{}", preface, START, report_json, END)
}

// ============================================================================
// In-memory chat store
// ============================================================================

#[derive(Default)]
pub struct InMemoryChatStore {
    chats: Mutex<HashMap<String, ChatSession>>,
    reports: Mutex<Vec<BiasReport>>,
    /// Mutating calls in the order they happened.
    ops: Mutex<Vec<String>>,
    unhealthy: AtomicBool,
}

impl InMemoryChatStore {
    pub fn chat(&self, chat_id: &str) -> Option<ChatSession> {
        self.chats.lock().unwrap().get(chat_id).cloned()
    }

    pub fn put_chat(&self, chat: ChatSession) {
        self.chats.lock().unwrap().insert(chat.id.clone(), chat);
    }

    pub fn reports(&self) -> Vec<BiasReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn put_report(&self, report: BiasReport) {
        self.reports.lock().unwrap().push(report);
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn set_unhealthy(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn find_chat(&self, chat_id: &str) -> Result<Option<ChatSession>, AppError> {
        let chat = self.chat(chat_id);
        // Let other tasks run between the read and the caller's write, as a
        // real database round trip would.
        tokio::task::yield_now().await;
        Ok(chat)
    }

    async fn insert_chat(&self, chat: &ChatSession) -> Result<(), AppError> {
        self.record(format!("insert_chat:{}", chat.id));
        self.put_chat(chat.clone());
        Ok(())
    }

    async fn save_chat(&self, chat: &ChatSession) -> Result<(), AppError> {
        self.record(format!("save_chat:{}", chat.id));
        self.put_chat(chat.clone());
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), AppError> {
        self.record(format!("delete_chat:{}", chat_id));
        self.chats.lock().unwrap().remove(chat_id);
        Ok(())
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, AppError> {
        let mut chats: Vec<ChatSummary> = self
            .chats
            .lock()
            .unwrap()
            .values()
            .filter(|chat| chat.is_owned_by(user_id))
            .map(ChatSummary::from)
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn insert_report(&self, report: &BiasReport) -> Result<(), AppError> {
        self.record(format!("insert_report:{}", report.chat_id));
        self.put_report(report.clone());
        Ok(())
    }

    async fn find_report(&self, report_id: &str) -> Result<Option<BiasReport>, AppError> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .find(|report| report.id == report_id)
            .cloned())
    }

    async fn delete_reports_for_chat(&self, chat_id: &str) -> Result<u64, AppError> {
        self.record(format!("delete_reports:{}", chat_id));
        let mut reports = self.reports.lock().unwrap();
        let before = reports.len();
        reports.retain(|report| report.chat_id != chat_id);
        Ok((before - reports.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!("database unreachable")));
        }
        Ok(())
    }
}

// ============================================================================
// In-memory object store
// ============================================================================

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn put(&self, key: &str, data: &[u8]) -> String {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        self.public_url(key)
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), AppError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamFailure(anyhow::anyhow!("bucket unavailable")));
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        self.object(key)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("object {} not found", key)))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", FILES_BASE_URL, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(FILES_BASE_URL)?
            .strip_prefix('/')
            .map(str::to_string)
    }
}

// ============================================================================
// Identity provider
// ============================================================================

#[derive(Default)]
pub struct FakeIdentityProvider {
    users: Mutex<HashMap<String, (String, UserIdentity)>>,
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserIdentity, AppError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(email) {
            return Err(AppError::BadRequest(anyhow::anyhow!("User already registered")));
        }
        let identity = UserIdentity {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
        };
        users.insert(email.to_string(), (password.to_string(), identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity, AppError> {
        match self.users.lock().unwrap().get(email) {
            Some((stored, identity)) if stored == password => Ok(identity.clone()),
            _ => Err(AppError::InvalidCredentials),
        }
    }
}

// ============================================================================
// Scripted text provider
// ============================================================================

/// Replies from a queue; once the queue is empty it keeps repeating the
/// default reply. Every prompt is recorded.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    default_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: default_reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self, error: ProviderError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    async fn generate(
        &self,
        _system_prompt: &str,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.default_reply.clone()));

        next.map(|text| ProviderResponse {
            text,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Complete,
        })
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Test application
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryChatStore>,
    pub storage: Arc<InMemoryObjectStore>,
    pub provider: Arc<ScriptedProvider>,
    pub tokens: Arc<TokenService>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_upload_limit(1024 * 1024)
    }

    pub fn with_upload_limit(upload_max_bytes: usize) -> Self {
        let store = Arc::new(InMemoryChatStore::default());
        let storage = Arc::new(InMemoryObjectStore::default());
        let provider = Arc::new(ScriptedProvider::new(reply_with_report(
            "Nothing stands out.",
            r#"{"bias_detected": false, "reasons": [], "fixes": []}"#,
        )));
        let tokens = Arc::new(TokenService::new(&Secret::new(JWT_SECRET.to_string()), 60));

        let model = ModelReplyService::new(provider.clone(), GenerationParams::default());
        let state = AppState {
            chats: ChatService::new(store.clone(), storage.clone(), model),
            store: store.clone(),
            storage: storage.clone(),
            identity: Arc::new(FakeIdentityProvider::default()),
            tokens: tokens.clone(),
            upload_max_bytes,
        };

        let router = build_router(state, &HttpSettings::default());

        Self {
            router,
            store,
            storage,
            provider,
            tokens,
        }
    }

    pub fn token_for(&self, user_id: &str) -> String {
        self.tokens
            .issue(&UserIdentity {
                id: user_id.to_string(),
                username: format!("{}-name", user_id),
                email: format!("{}@example.com", user_id),
            })
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request(Method::DELETE, uri, token, None)).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }

    pub async fn chat(&self, token: &str, chat_id: &str, message: &str) -> TestResponse {
        self.post_json(
            "/api/chat",
            Some(token),
            serde_json::json!({ "chatId": chat_id, "message": message }),
        )
        .await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
