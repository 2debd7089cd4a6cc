use super::error::{PostgresDaoError, PostgresResult};

/// Connection settings for the durable record store.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_env() -> PostgresResult<Self> {
        let url = std::env::var("DATABASE_URL").map_err(|_| PostgresDaoError::MissingEnvVar {
            var: "DATABASE_URL",
        })?;
        Ok(Self::new(url))
    }
}
