use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cors_origin: String,
    pub cookie_secure: bool,
    pub host: String,
    pub port: u16,
}

const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Upper bound for either token lifetime.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch
    /// the process environment.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| var(key).with_context(|| format!("{key} must be set"));

        let database_url = required("DATABASE_URL")?;
        let access_secret = required("JWT_ACCESS_SECRET")?;
        let refresh_secret = required("JWT_REFRESH_SECRET")?;
        anyhow::ensure!(
            access_secret != refresh_secret,
            "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ"
        );

        let access_ttl = match var("ACCESS_TOKEN_EXPIRES") {
            Some(v) => parse_ttl(&v).context("ACCESS_TOKEN_EXPIRES")?,
            None => DEFAULT_ACCESS_TTL,
        };
        let refresh_ttl = match var("REFRESH_TOKEN_EXPIRES") {
            Some(v) => parse_ttl(&v).context("REFRESH_TOKEN_EXPIRES")?,
            None => DEFAULT_REFRESH_TTL,
        };

        let jwt = JwtConfig {
            access_secret,
            refresh_secret,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "todo-api".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "todo-api-users".into()),
            access_ttl,
            refresh_ttl,
        };

        let port = var("APP_PORT")
            .or_else(|| var("PORT"))
            .map(|v| v.parse::<u16>().context("APP_PORT must be a port number"))
            .transpose()?
            .unwrap_or(5000);

        Ok(Self {
            database_url,
            jwt,
            cors_origin: var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".into()),
            cookie_secure: var("COOKIE_SECURE")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(false),
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
        })
    }
}

/// Parses `30s`, `15m`, `12h`, `7d` or a bare number of seconds.
pub fn parse_ttl(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let amount: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration {raw:?}"))?;
    let factor: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => anyhow::bail!("unknown duration unit {other:?} in {raw:?}"),
    };
    let secs = amount
        .checked_mul(factor)
        .with_context(|| format!("duration {raw:?} is too large"))?;
    anyhow::ensure!(secs > 0, "duration {raw:?} must be positive");
    anyhow::ensure!(
        secs <= MAX_TTL.as_secs(),
        "duration {raw:?} exceeds the maximum of 365d"
    );
    Ok(Duration::from_secs(secs))
}
