use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub jwt: JwtConfig,
    pub ledger: LedgerConfig,
    pub credentials: CredentialsConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum SigningAlgorithm {
    #[serde(rename = "HS256")]
    Hs256,
    #[serde(rename = "RS256")]
    Rs256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub algorithm: SigningAlgorithm,
    pub secret: Option<Secret<String>>,
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
    pub issuer: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

impl JwtConfig {
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_expiry_minutes)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_expiry_days)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub redis_url: Option<Secret<String>>,
    /// How often the in-memory ledger drops entries past retention.
    pub gc_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// JSON file of identities loaded into the in-memory credential store.
    pub seed_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub require_verified_email: bool,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let algorithm: SigningAlgorithm = get_env("JWT_ALGORITHM", Some("HS256"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let ledger_backend: LedgerBackend = get_env("LEDGER_BACKEND", Some("memory"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("catalog-auth"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            jwt: JwtConfig {
                algorithm,
                secret: get_optional_env("JWT_SECRET").map(Secret::new),
                private_key_path: get_optional_env("JWT_PRIVATE_KEY_PATH"),
                public_key_path: get_optional_env("JWT_PUBLIC_KEY_PATH"),
                issuer: get_env("JWT_ISSUER", Some("catalog-auth"), is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("15"),
                    is_prod,
                )?,
                refresh_token_expiry_days: parse_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_DAYS",
                    Some("7"),
                    is_prod,
                )?,
            },
            ledger: LedgerConfig {
                backend: ledger_backend,
                redis_url: get_optional_env("REDIS_URL").map(Secret::new),
                gc_interval_seconds: parse_env("LEDGER_GC_INTERVAL_SECONDS", Some("300"), is_prod)?,
            },
            credentials: CredentialsConfig {
                seed_path: get_optional_env("CREDENTIALS_SEED_PATH"),
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                require_verified_email: parse_env("REQUIRE_VERIFIED_EMAIL", Some("false"), is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.jwt.access_token_ttl() >= self.jwt.refresh_token_ttl() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Access token lifetime must be shorter than refresh token lifetime"
            )));
        }

        match self.jwt.algorithm {
            SigningAlgorithm::Hs256 if self.jwt.secret.is_none() => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET is required when JWT_ALGORITHM is HS256"
                )));
            }
            SigningAlgorithm::Rs256
                if self.jwt.private_key_path.is_none() || self.jwt.public_key_path.is_none() =>
            {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_PRIVATE_KEY_PATH and JWT_PUBLIC_KEY_PATH are required when JWT_ALGORITHM is RS256"
                )));
            }
            _ => {}
        }

        if self.ledger.backend == LedgerBackend::Redis && self.ledger.redis_url.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REDIS_URL is required when LEDGER_BACKEND is redis"
            )));
        }

        if self.ledger.gc_interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LEDGER_GC_INTERVAL_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.ledger.backend == LedgerBackend::Memory {
                tracing::warn!(
                    "In-memory revocation ledger in production: replay defense does not span replicas"
                );
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "RS256" => Ok(SigningAlgorithm::Rs256),
            _ => Err(format!("Invalid JWT algorithm: {}", s)),
        }
    }
}

impl std::str::FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(LedgerBackend::Memory),
            "redis" => Ok(LedgerBackend::Redis),
            _ => Err(format!("Invalid ledger backend: {}", s)),
        }
    }
}
