use super::error::{RedisDaoError, RedisResult};

/// Connection settings for the volatile store.
///
/// The URL carries credentials, database index, and TLS scheme
/// (`redis://` or `rediss://`), so a single value covers every deployment.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_env() -> RedisResult<Self> {
        let url = std::env::var("REDIS_URL")
            .map_err(|_| RedisDaoError::MissingEnvVar { var: "REDIS_URL" })?;
        Ok(Self::new(url))
    }
}
