use devpulse_ingest::fixture::FixtureConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Snowflake generator coordinates; give every deployment a distinct pair.
    #[serde(default = "default_machine_id")]
    pub machine_id: i32,
    #[serde(default = "default_node_id")]
    pub node_id: i32,

    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            machine_id: default_machine_id(),
            node_id: default_node_id(),
            refresh: RefreshConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_machine_id() -> i32 {
    1
}

fn default_node_id() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Entities whose last scan is older than this are reported stale.
    #[serde(default = "default_stale_threshold_hours")]
    pub stale_threshold_hours: f64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: default_refresh_enabled(),
            interval_secs: default_interval_secs(),
            window_days: default_window_days(),
            stale_threshold_hours: default_stale_threshold_hours(),
        }
    }
}

fn default_refresh_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    21600 // Refresh every 6 hours
}

fn default_window_days() -> i64 {
    30
}

fn default_stale_threshold_hours() -> f64 {
    12.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Adapter to pull raw records from. Only "fixture" ships today.
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub fixture: FixtureConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            fixture: FixtureConfig::default(),
        }
    }
}

fn default_source() -> String {
    "fixture".to_string()
}

// ---- Benchmarks seed file types (used by `init-benchmarks` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarksSeedFile {
    #[serde(default)]
    pub benchmarks: Vec<SeedBenchmark>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBenchmark {
    pub metric: String,
    pub operator: String,
    #[serde(default)]
    pub pass_threshold: Option<f64>,
    #[serde(default)]
    pub warn_threshold: Option<f64>,
    #[serde(default)]
    pub fail_threshold: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Defaults to the metric key's group prefix when omitted.
    #[serde(default)]
    pub category: Option<String>,
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
