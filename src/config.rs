use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Where the prediction service lives and how long we wait for it.
#[derive(Debug, Clone, Deserialize)]
pub struct MlConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs on the in-memory stores.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub ml: MlConfig,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "agroguard".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "agroguard-users".into()),
        };
        let ml = MlConfig {
            base_url: std::env::var("ML_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000".into())
                .trim_end_matches('/')
                .to_string(),
            timeout_secs: std::env::var("ML_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        };
        let cors_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into()),
        );
        Ok(Self {
            database_url,
            jwt,
            ml,
            cors_origins,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    if raw.trim() == "*" {
        return Vec::new();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_origins;

    #[test]
    fn origins_are_split_and_trimmed() {
        let origins = parse_origins(" http://a.test , http://b.test,,");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn wildcard_means_any_origin() {
        assert!(parse_origins("*").is_empty());
    }
}
