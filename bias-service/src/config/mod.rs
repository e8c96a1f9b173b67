use secrecy::Secret;
use service_core::config::{self as core_config, get_env, get_env_parsed, is_production};
use service_core::error::AppError;
use std::env;

/// Upload ceiling applied when `UPLOAD_MAX_BYTES` is not set (20 MiB).
const DEFAULT_UPLOAD_MAX_BYTES: &str = "20971520";

#[derive(Debug, Clone)]
pub struct BiasConfig {
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub auth: AuthConfig,
    pub genai: GenaiConfig,
    pub storage: StorageConfig,
    pub supabase: SupabaseConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct GenaiConfig {
    pub provider: ProviderKind,
    pub api_key: Secret<String>,
    pub base_url: String,
    pub text_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Mock,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    /// Base URL under which locally stored files are served.
    pub public_base_url: String,
    pub bucket: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: Secret<String>,
    pub service_key: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub cors_allowed_origin: Option<String>,
    pub upload_max_bytes: usize,
}

impl BiasConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = is_production();

        Ok(BiasConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("biasbuster_db"), is_prod)?,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(get_env("JWT_SECRET", None, is_prod)?),
                token_ttl_minutes: token_ttl_minutes(get_env_parsed(
                    "JWT_TTL_MINUTES",
                    "1440",
                    is_prod,
                )?)?,
            },
            genai: GenaiConfig {
                provider: get_env("GENAI_PROVIDER", Some("openai"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                api_key: Secret::new(get_env("OPENAI_API_KEY", Some(""), is_prod)?),
                base_url: get_env("OPENAI_BASE_URL", Some("https://api.openai.com/v1"), is_prod)?,
                text_model: get_env("GENAI_TEXT_MODEL", Some("gpt-4o-mini"), is_prod)?,
                temperature: get_env_parsed("GENAI_TEMPERATURE", "0.7", is_prod)?,
                max_tokens: get_env_parsed("GENAI_MAX_TOKENS", "2000", is_prod)?,
            },
            storage: StorageConfig {
                backend: get_env("STORAGE_BACKEND", Some("local"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
                public_base_url: get_env(
                    "STORAGE_PUBLIC_BASE_URL",
                    Some("http://localhost:8000/files"),
                    is_prod,
                )?,
                bucket: get_env("STORAGE_BUCKET", Some("uploads"), is_prod)?,
            },
            supabase: SupabaseConfig {
                url: get_env("SUPABASE_URL", Some("http://localhost:54321"), is_prod)?,
                anon_key: Secret::new(get_env("SUPABASE_ANON_KEY", Some(""), is_prod)?),
                service_key: Secret::new(get_env("SUPABASE_SERVICE_KEY", Some(""), is_prod)?),
            },
            http: HttpConfig {
                cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                    .ok()
                    .or_else(|| (!is_prod).then(|| "http://localhost:8080".to_string()))
                    .filter(|origin| !origin.is_empty()),
                upload_max_bytes: get_env_parsed(
                    "UPLOAD_MAX_BYTES",
                    DEFAULT_UPLOAD_MAX_BYTES,
                    is_prod,
                )?,
            },
        })
    }
}

/// Longest accepted token lifetime (one year).
const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

fn token_ttl_minutes(minutes: i64) -> Result<i64, AppError> {
    if (1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(AppError::ConfigError(anyhow::anyhow!(
            "JWT_TTL_MINUTES must be between 1 and {}, got {}",
            MAX_TOKEN_TTL_MINUTES,
            minutes
        )))
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "mock" => Ok(ProviderKind::Mock),
            _ => Err(format!("Invalid GenAI provider: {}", s)),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "supabase" => Ok(StorageBackend::Supabase),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!("mock".parse::<ProviderKind>(), Ok(ProviderKind::Mock));
        assert!("gemini".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn token_ttl_must_be_positive_and_bounded() {
        assert_eq!(token_ttl_minutes(1440).unwrap(), 1440);
        assert_eq!(
            token_ttl_minutes(MAX_TOKEN_TTL_MINUTES).unwrap(),
            MAX_TOKEN_TTL_MINUTES
        );

        for minutes in [0, -5, MAX_TOKEN_TTL_MINUTES + 1, i64::MAX] {
            let err = token_ttl_minutes(minutes).unwrap_err();
            assert!(matches!(err, AppError::ConfigError(_)), "{} accepted", minutes);
        }
    }

    #[test]
    fn storage_backend_rejects_unknown_values() {
        assert_eq!("local".parse::<StorageBackend>(), Ok(StorageBackend::Local));
        assert_eq!(
            "Supabase".parse::<StorageBackend>(),
            Ok(StorageBackend::Supabase)
        );
        assert!("s3".parse::<StorageBackend>().is_err());
    }
}
