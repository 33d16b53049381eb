use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

pub const fn polling_interval_slots() -> u64 {
    1
}

pub const fn worker_pool_size() -> usize {
    10
}

pub const fn requests_per_second() -> f64 {
    50.0
}

pub const fn burst() -> u32 {
    100
}

pub const fn http_timeout_seconds() -> u64 {
    30
}

pub const fn max_idle_conns() -> usize {
    100
}

pub const fn replication_factor() -> i32 {
    3
}

pub fn consistency() -> String {
    "local_quorum".to_string()
}

pub const fn store_timeout_seconds() -> u64 {
    10
}

pub const fn max_retries() -> u32 {
    3
}

pub const fn ttl_days() -> u32 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub beacon_node_url: String,
    pub validators: Vec<u64>,
    #[serde(default = "polling_interval_slots")]
    pub polling_interval_slots: u64,
    #[serde(default = "worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "requests_per_second")]
    pub requests_per_second: f64,
    #[serde(default = "burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: requests_per_second(),
            burst: burst(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "http_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "max_idle_conns")]
    pub max_idle_conns: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: http_timeout_seconds(),
            max_idle_conns: max_idle_conns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    #[serde(default = "replication_factor")]
    pub replication_factor: i32,
    #[serde(default = "consistency")]
    pub consistency: String,
    #[serde(default = "store_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "max_retries")]
    pub max_retries: u32,
    #[serde(default = "ttl_days")]
    pub ttl_days: u32,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// The per-row TTL applied to every table, in seconds.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_days as i64 * 24 * 60 * 60
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Config, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file {}: {:?}", path, e))?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Unable to parse config file {}: {:?}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.beacon_node_url.is_empty() {
            return Err("beacon_node_url is required".to_string());
        }
        if self.validators.is_empty() {
            return Err("at least one validator index is required".to_string());
        }
        if self.store.hosts.is_empty() {
            return Err("at least one store host is required".to_string());
        }
        if self.store.keyspace.is_empty() {
            return Err("store keyspace is required".to_string());
        }
        if self.rate_limit.requests_per_second <= 0.0 || self.rate_limit.burst == 0 {
            return Err("rate limit must be positive".to_string());
        }
        if self.polling_interval_slots == 0 {
            return Err("polling_interval_slots must be positive".to_string());
        }
        if self.worker_pool_size == 0 {
            return Err("worker_pool_size must be positive".to_string());
        }
        Ok(())
    }
}
