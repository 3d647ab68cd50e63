use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub scoring_url: String,
    pub scoring_timeout: Option<Duration>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub supabase: Option<SupabaseConfig>,
    pub chain: Option<ChainConfig>,
    pub port: u16,
    pub rust_log: String,
}

/// Hosted identity provider credentials. Both values must be set together.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

/// JSON-RPC node and contract used by the hash recorder.
#[derive(Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub contract_address: String,
    /// Hex secp256k1 key; transactions are signed locally and the sender
    /// address is derived from it.
    pub private_key: String,
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("private_key", &"<redacted>")
            .field("receipt_timeout", &self.receipt_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let scoring_timeout = optional_env("SCORING_TIMEOUT_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("SCORING_TIMEOUT_SECS must be a whole number of seconds")?
            .map(Duration::from_secs);

        let supabase = match (optional_env("SUPABASE_URL"), optional_env("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(SupabaseConfig { url, anon_key }),
            (None, None) => None,
            _ => anyhow::bail!("SUPABASE_URL and SUPABASE_ANON_KEY must be set together"),
        };

        let chain = match optional_env("CHAIN_RPC_URL") {
            Some(rpc_url) => Some(ChainConfig {
                rpc_url,
                contract_address: require_env("HASH_CONTRACT_ADDRESS")?,
                private_key: require_env("CHAIN_PRIVATE_KEY")?,
                receipt_timeout: Duration::from_secs(
                    parse_or("CHAIN_RECEIPT_TIMEOUT_SECS", DEFAULT_RECEIPT_TIMEOUT_SECS)?,
                ),
                poll_interval: Duration::from_millis(
                    parse_or("CHAIN_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
                ),
            }),
            None => None,
        };

        Ok(Config {
            scoring_url: require_env("SCORING_SERVICE_URL")?,
            scoring_timeout,
            upload_dir: PathBuf::from(
                optional_env("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            ),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            supabase,
            chain,
            port: parse_or("PORT", 5001)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}
