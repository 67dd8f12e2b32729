/// Prefix of every rate-limit counter key.
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// Counter key for one caller on one endpoint: `rate_limit:<identity>:<endpoint>`.
pub fn rate_limit_key(identity: &str, endpoint: &str) -> String {
    format!("{}{}:{}", RATE_LIMIT_PREFIX, identity, endpoint)
}
