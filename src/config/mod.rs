use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Endpoints guarded by the rate limiter; each may override the default rule.
pub const RATE_LIMITED_ENDPOINTS: [&str; 2] = ["vehicle_emissions", "vehicle_emissions/compare"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(String),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Production,
    Development,
    Test,
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// What the limiter does when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Admit the call. The limiter is treated as non-critical.
    Open,
    /// Refuse the call with 503.
    Closed,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("expected 'open' or 'closed', got '{}'", other)),
        }
    }
}

/// `limit` calls per tumbling window of `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window_secs: u64,
}

impl RateLimitRule {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// `REDIS_URL` value that selects the in-process store.
pub const MEMORY_BACKEND: &str = "memory";

/// Where rate-limit counters and cached responses live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Redis(String),
    /// Per-process store. Limits hold per instance only.
    Memory,
}

impl StoreBackend {
    /// A full `REDIS_URL` wins; otherwise host and port, defaulting to localhost.
    fn resolve(url: Option<String>, host: Option<String>, port: u16) -> Self {
        let url = url.filter(|url| !url.trim().is_empty());
        let host = host.filter(|host| !host.trim().is_empty());
        match url {
            Some(url) if url.trim().eq_ignore_ascii_case(MEMORY_BACKEND) => StoreBackend::Memory,
            Some(url) => StoreBackend::Redis(url),
            None => StoreBackend::Redis(format!(
                "redis://{}:{}",
                host.as_deref().unwrap_or("localhost"),
                port
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub database_url: String,
    pub db_max_connections: u32,
    pub store_backend: StoreBackend,
    pub store_timeout_ms: u64,
    pub cache_expire_secs: u64,
    pub default_rate_limit: RateLimitRule,
    pub endpoint_rate_limits: HashMap<String, RateLimitRule>,
    pub rate_limit_failure_policy: FailurePolicy,
    pub jwt_secret: String,
    pub jwt_expiration_minutes: i64,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let app_env: AppEnv = parse_or("APP_ENV", AppEnv::Production)?;
        let database_url = match app_env {
            AppEnv::Test => required("DATABASE_TEST_URL")?,
            _ => required("DATABASE_URL")?,
        };

        let store_backend = StoreBackend::resolve(
            env::var("REDIS_URL").ok(),
            env::var("REDIS_HOST").ok(),
            parse_or("REDIS_PORT", 6379)?,
        );

        let default_rate_limit = RateLimitRule {
            limit: parse_or("RATE_LIMIT_REQUESTS", 10)?,
            window_secs: parse_or("RATE_LIMIT_WINDOW", 60)?,
        };
        validate_rule("RATE_LIMIT", &default_rate_limit)?;

        let mut endpoint_rate_limits = HashMap::new();
        for endpoint in RATE_LIMITED_ENDPOINTS {
            let prefix = format!("RATE_LIMIT_{}", env_segment(endpoint));
            let rule = RateLimitRule {
                limit: parse_or(&format!("{}_REQUESTS", prefix), default_rate_limit.limit)?,
                window_secs: parse_or(&format!("{}_WINDOW", prefix), default_rate_limit.window_secs)?,
            };
            validate_rule(&prefix, &rule)?;
            endpoint_rate_limits.insert(endpoint.to_string(), rule);
        }

        Ok(Config {
            app_env,
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 20)?,
            store_backend,
            store_timeout_ms: parse_or("STORE_TIMEOUT_MS", 250)?,
            cache_expire_secs: parse_or("REDIS_CACHE_EXPIRE", 600)?,
            default_rate_limit,
            endpoint_rate_limits,
            rate_limit_failure_policy: parse_or("RATE_LIMIT_FAILURE_POLICY", FailurePolicy::Open)?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration_minutes: parse_or("JWT_EXPIRATION", 30)?,
            server_host: parse_or("SERVER_HOST", "0.0.0.0".to_string())?,
            server_port: parse_or("SERVER_PORT", 8000)?,
        })
    }

    /// Rule for `endpoint`, falling back to the default.
    pub fn rate_limit_rule(&self, endpoint: &str) -> RateLimitRule {
        self.endpoint_rate_limits
            .get(endpoint)
            .copied()
            .unwrap_or(self.default_rate_limit)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Schema SQL runs against; test runs get a per-process schema.
    pub fn db_schema(&self) -> String {
        match self.app_env {
            AppEnv::Test => format!("test_schema_{}", std::process::id()),
            _ => "public".to_string(),
        }
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name.to_string()))
}

fn parse_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: name.to_string(),
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn validate_rule(prefix: &str, rule: &RateLimitRule) -> Result<(), ConfigError> {
    let invalid = |suffix: &str, value: String| ConfigError::Invalid {
        name: format!("{}_{}", prefix, suffix),
        value,
        reason: "must be greater than 0".to_string(),
    };
    if rule.limit == 0 {
        return Err(invalid("REQUESTS", rule.limit.to_string()));
    }
    if rule.window_secs == 0 {
        return Err(invalid("WINDOW", rule.window_secs.to_string()));
    }
    Ok(())
}

/// `vehicle_emissions/compare` -> `VEHICLE_EMISSIONS_COMPARE`
fn env_segment(endpoint: &str) -> String {
    endpoint
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let rule = RateLimitRule {
            limit: 10,
            window_secs: 60,
        };
        Config {
            app_env: AppEnv::Test,
            database_url: "postgres://localhost/carboncity".to_string(),
            db_max_connections: 1,
            store_backend: StoreBackend::Memory,
            store_timeout_ms: 250,
            cache_expire_secs: 600,
            default_rate_limit: rule,
            endpoint_rate_limits: HashMap::from([(
                "vehicle_emissions/compare".to_string(),
                RateLimitRule {
                    limit: 5,
                    window_secs: 30,
                },
            )]),
            rate_limit_failure_policy: FailurePolicy::Open,
            jwt_secret: "secret".to_string(),
            jwt_expiration_minutes: 30,
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
        }
    }

    #[test]
    fn test_store_backend_defaults_to_local_redis() {
        assert_eq!(
            StoreBackend::resolve(None, None, 6379),
            StoreBackend::Redis("redis://localhost:6379".to_string())
        );
        assert_eq!(
            StoreBackend::resolve(Some("  ".to_string()), Some(String::new()), 6379),
            StoreBackend::Redis("redis://localhost:6379".to_string())
        );
    }

    #[test]
    fn test_store_backend_host_and_port() {
        assert_eq!(
            StoreBackend::resolve(None, Some("cache.internal".to_string()), 6380),
            StoreBackend::Redis("redis://cache.internal:6380".to_string())
        );
    }

    #[test]
    fn test_store_backend_url_wins_over_host() {
        assert_eq!(
            StoreBackend::resolve(
                Some("redis://:pw@redis.example:6390/2".to_string()),
                Some("ignored".to_string()),
                6379
            ),
            StoreBackend::Redis("redis://:pw@redis.example:6390/2".to_string())
        );
    }

    #[test]
    fn test_store_backend_memory_opt_in() {
        assert_eq!(StoreBackend::resolve(Some("memory".to_string()), None, 6379), StoreBackend::Memory);
        assert_eq!(
            StoreBackend::resolve(Some(" MEMORY ".to_string()), Some("redis-host".to_string()), 6379),
            StoreBackend::Memory
        );
    }

    #[test]
    fn test_env_segment() {
        assert_eq!(env_segment("vehicle_emissions"), "VEHICLE_EMISSIONS");
        assert_eq!(env_segment("vehicle_emissions/compare"), "VEHICLE_EMISSIONS_COMPARE");
    }

    #[test]
    fn test_rule_lookup_falls_back_to_default() {
        let config = config();
        assert_eq!(config.rate_limit_rule("vehicle_emissions/compare").limit, 5);
        assert_eq!(config.rate_limit_rule("vehicle_emissions").limit, 10);
        assert_eq!(config.rate_limit_rule("vehicle_emissions").window(), Duration::from_secs(60));
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("open".parse::<FailurePolicy>(), Ok(FailurePolicy::Open));
        assert_eq!("CLOSED".parse::<FailurePolicy>(), Ok(FailurePolicy::Closed));
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_app_env_parse() {
        assert_eq!("test".parse::<AppEnv>(), Ok(AppEnv::Test));
        assert!("staging".parse::<AppEnv>().is_err());
    }

    #[test]
    fn test_zero_rule_rejected() {
        let rule = RateLimitRule {
            limit: 0,
            window_secs: 60,
        };
        assert!(matches!(
            validate_rule("RATE_LIMIT", &rule),
            Err(ConfigError::Invalid { ref name, .. }) if name == "RATE_LIMIT_REQUESTS"
        ));
    }

    #[test]
    fn test_test_env_uses_process_schema() {
        assert_eq!(config().db_schema(), format!("test_schema_{}", std::process::id()));
    }
}
