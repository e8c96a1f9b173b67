use crate::config::{BiasConfig, ProviderKind, StorageBackend};
use crate::handlers;
use crate::middleware::auth_middleware;
use crate::services::providers::{
    GenerationParams, MockTextProvider, OpenAiConfig, OpenAiTextProvider, TextProvider,
};
use crate::services::{
    ChatService, ChatStore, IdentityProvider, LocalStorage, ModelReplyService, MongoChatStore,
    ObjectStore, SupabaseIdentityProvider, SupabaseStorage, TokenService,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Multipart framing allowance on top of the upload ceiling.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub chats: ChatService,
    pub store: Arc<dyn ChatStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub tokens: Arc<TokenService>,
    pub upload_max_bytes: usize,
}

/// Router options that are not part of the request-handling state.
#[derive(Debug, Clone, Default)]
pub struct HttpSettings {
    pub cors_allowed_origin: Option<String>,
    /// Directory served under `/files` when uploads are stored locally.
    pub serve_local_files: Option<PathBuf>,
}

pub fn build_router(state: AppState, settings: &HttpSettings) -> Router {
    let upload_limit = state.upload_max_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route("/api/chat", post(handlers::send_message))
        .route("/api/chat/new", post(handlers::new_chat))
        .route(
            "/api/chat/:chat_id",
            get(handlers::get_chat).delete(handlers::delete_chat),
        )
        .route("/api/history", get(handlers::history))
        .route("/api/report/download", post(handlers::download_report))
        .route(
            "/api/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let mut app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .merge(protected);

    if let Some(dir) = &settings.serve_local_files {
        app = app.nest_service("/files", ServeDir::new(dir));
    }

    let mut app = app
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware));

    if let Some(origin) = &settings.cors_allowed_origin {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                app = app.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_credentials(true)
                        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
                );
            }
            Err(e) => tracing::error!("Invalid CORS origin '{}': {}. CORS disabled.", origin, e),
        }
    }

    app.with_state(state)
}

pub struct Application {
    port: u16,
    server: Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>,
    store: Arc<dyn ChatStore>,
}

impl Application {
    pub async fn build(config: BiasConfig) -> Result<Self, AppError> {
        let db = MongoChatStore::connect(&config.mongodb.uri, &config.mongodb.database).await?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;
        let store: Arc<dyn ChatStore> = Arc::new(db);

        let (storage, serve_local_files): (Arc<dyn ObjectStore>, Option<PathBuf>) =
            match config.storage.backend {
                StorageBackend::Local => {
                    let local = LocalStorage::new(
                        &config.storage.local_path,
                        &config.storage.public_base_url,
                    )
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            "Failed to initialize local storage at {}: {}",
                            config.storage.local_path,
                            e
                        );
                        e
                    })?;
                    let dir = local.base_path().to_path_buf();
                    (Arc::new(local), Some(dir))
                }
                StorageBackend::Supabase => (
                    Arc::new(SupabaseStorage::new(
                        &config.supabase.url,
                        &config.storage.bucket,
                        config.supabase.service_key.clone(),
                    )),
                    None,
                ),
            };

        let identity: Arc<dyn IdentityProvider> = Arc::new(SupabaseIdentityProvider::new(
            &config.supabase.url,
            config.supabase.anon_key.clone(),
        ));

        let provider: Arc<dyn TextProvider> = match config.genai.provider {
            ProviderKind::OpenAi => Arc::new(
                OpenAiTextProvider::new(OpenAiConfig {
                    api_key: config.genai.api_key.clone(),
                    base_url: config.genai.base_url.clone(),
                    model: config.genai.text_model.clone(),
                })
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
            ),
            ProviderKind::Mock => {
                tracing::warn!("Using mock text provider");
                Arc::new(MockTextProvider::new(true))
            }
        };
        tracing::info!(model = %provider.model(), "Text provider ready");

        let model = ModelReplyService::new(
            provider,
            GenerationParams {
                temperature: config.genai.temperature,
                max_tokens: config.genai.max_tokens,
            },
        );

        let state = AppState {
            chats: ChatService::new(store.clone(), storage.clone(), model),
            store: store.clone(),
            storage,
            identity,
            tokens: Arc::new(TokenService::new(
                &config.auth.jwt_secret,
                config.auth.token_ttl_minutes,
            )),
            upload_max_bytes: config.http.upload_max_bytes,
        };

        let app = build_router(
            state,
            &HttpSettings {
                cors_allowed_origin: config.http.cors_allowed_origin.clone(),
                serve_local_files,
            },
        );

        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::pin(server.into_future()),
            store,
        })
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
