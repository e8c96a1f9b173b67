use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Object store for uploaded files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError>;

    /// Public URL under which `key` is served.
    fn public_url(&self, key: &str) -> String;

    /// Inverse of [`ObjectStore::public_url`]; `None` for URLs this store
    /// did not hand out.
    fn key_from_url(&self, url: &str) -> Option<String>;
}

/// Keys are relative, slash-separated paths without `.` or `..` segments.
fn validate_key(key: &str) -> Result<(), AppError> {
    let valid = !key.is_empty()
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!("Invalid storage key")))
    }
}

fn strip_url_prefix(url: &str, prefix: &str) -> Option<String> {
    let key = url.strip_prefix(prefix)?.strip_prefix('/')?;
    validate_key(key).ok()?;
    Some(key.to_string())
}

pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), AppError> {
        validate_key(key)?;
        let path = self.base_path.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        validate_key(key)?;
        let path = self.base_path.join(key);
        let data = fs::read(path).await?;
        Ok(data)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        strip_url_prefix(url, &self.public_base_url)
    }
}

/// Supabase Storage over its REST API.
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    bucket: String,
    service_key: Secret<String>,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, bucket: &str, service_key: Secret<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}", self.base_url, self.bucket)
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        validate_key(key)?;
        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(self.service_key.expose_secret())
            .header("apikey", self.service_key.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| AppError::UpstreamFailure(anyhow::anyhow!("Storage upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamFailure(anyhow::anyhow!(
                "Storage upload failed with {}: {}",
                status,
                body
            )));
        }
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        validate_key(key)?;
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(self.service_key.expose_secret())
            .header("apikey", self.service_key.expose_secret())
            .send()
            .await
            .map_err(|e| {
                AppError::UpstreamFailure(anyhow::anyhow!("Storage download failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamFailure(anyhow::anyhow!(
                "Storage download failed with {}",
                response.status()
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| AppError::UpstreamFailure(anyhow::anyhow!("Storage body read failed: {}", e)))?
            .to_vec();
        Ok(data)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_prefix(), key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        strip_url_prefix(url, &self.public_prefix())
    }
}
