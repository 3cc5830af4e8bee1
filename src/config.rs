use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub token_ttl_minutes: i64,
    /// Echo freshly issued reset tokens in the response. Local use only.
    pub token_in_response: bool,
}

/// Where task collections live. Users are always kept in Postgres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskBackend {
    #[default]
    Postgres,
    Memory,
}

impl std::str::FromStr for TaskBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(TaskBackend::Postgres),
            "memory" => Ok(TaskBackend::Memory),
            other => anyhow::bail!("unknown TASK_STORE `{other}`"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub reset: ResetConfig,
    pub session_cookie_secure: bool,
    pub task_store: TaskBackend,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "tasklist".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "tasklist-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        let reset = ResetConfig {
            token_ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES").unwrap_or(60),
            token_in_response: env_parse("RESET_TOKEN_IN_RESPONSE").unwrap_or(false),
        };
        let task_store = match std::env::var("TASK_STORE") {
            Ok(raw) => raw.trim().parse()?,
            Err(_) => TaskBackend::default(),
        };
        Ok(Self {
            database_url,
            jwt,
            reset,
            session_cookie_secure: env_parse("SESSION_COOKIE_SECURE").unwrap_or(false),
            task_store,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
