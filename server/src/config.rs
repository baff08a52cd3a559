//! Server configuration.
//!
//! Loaded from a TOML file; every field defaults to the stock deployment
//! (port 11211, 160 MiB budget) so the binary runs with no configuration
//! at all.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Server configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// TCP listener configuration.
    pub listener: ListenerConfig,

    /// Cache sizing.
    pub cache: CacheConfig,

    /// Worker pool configuration.
    pub workers: WorkersConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// TCP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ListenerConfig {
    /// Address to listen on.
    pub address: SocketAddr,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:11211".parse().unwrap(),
        }
    }
}

/// Cache sizing configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    /// Global memory budget (e.g. "160MB").
    #[serde(deserialize_with = "deserialize_size")]
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: slab_cache::DEFAULT_MAX_BYTES,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WorkersConfig {
    /// Resident worker threads (default: half the CPUs, at least one).
    pub core_threads: Option<usize>,

    /// Upper bound on worker threads (default: number of CPUs).
    pub max_threads: Option<usize>,

    /// Depth of the pending-request queue.
    pub queue_depth: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            core_threads: None,
            max_threads: None,
            queue_depth: 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable with ANSI colors.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
    /// Single-line compact output.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "server=debug").
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Include timestamps in events.
    pub timestamps: bool,

    /// Include the event target (module path).
    pub target: bool,

    /// Include thread names.
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            timestamps: true,
            target: false,
            thread_names: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.cache.max_bytes < slab_cache::PAGE_SIZE {
            return Err(format!(
                "cache.max_bytes ({}) must be at least one page ({})",
                self.cache.max_bytes,
                slab_cache::PAGE_SIZE
            )
            .into());
        }

        if self.workers.queue_depth == 0 {
            return Err("workers.queue_depth must be nonzero".into());
        }

        if self.core_workers() > self.max_workers() {
            return Err(format!(
                "workers.core_threads ({}) must not exceed workers.max_threads ({})",
                self.core_workers(),
                self.max_workers()
            )
            .into());
        }

        Ok(())
    }

    /// Number of resident worker threads.
    pub fn core_workers(&self) -> usize {
        self.workers
            .core_threads
            .unwrap_or_else(|| (num_cpus::get() / 2).max(1))
    }

    /// Upper bound on worker threads.
    pub fn max_workers(&self) -> usize {
        self.workers.max_threads.unwrap_or_else(num_cpus::get)
    }
}

/// Units accepted in size strings and used when rendering them, largest
/// first. Single-letter forms are accepted on input.
const SIZE_UNITS: &[(&str, usize)] = &[
    ("TB", 1 << 40),
    ("GB", 1 << 30),
    ("MB", 1 << 20),
    ("KB", 1 << 10),
    ("B", 1),
];

/// Deserialize a byte count given either as an integer or as a size string
/// like "160MB".
fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct SizeVisitor;

    impl serde::de::Visitor<'_> for SizeVisitor {
        type Value = usize;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a byte count or a size string like \"160MB\"")
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<usize, E> {
            usize::try_from(v).map_err(E::custom)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<usize, E> {
            usize::try_from(v).map_err(E::custom)
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<usize, E> {
            parse_size(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(SizeVisitor)
}

/// Parse a human-readable size like "160MB", "4G" or "1024" into bytes.
/// Units are case-insensitive; a bare number is a byte count.
pub fn parse_size(input: &str) -> Result<usize, String> {
    let input = input.trim();
    let digits = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(digits);

    let number: usize = number
        .parse()
        .map_err(|_| format!("size must start with a number: {input:?}"))?;
    let unit = unit.trim();
    if unit.is_empty() {
        return Ok(number);
    }

    let scale = SIZE_UNITS
        .iter()
        .find(|(suffix, _)| {
            unit.eq_ignore_ascii_case(suffix) || unit.eq_ignore_ascii_case(&suffix[..1])
        })
        .map(|&(_, scale)| scale)
        .ok_or_else(|| format!("unknown size unit: {unit:?}"))?;

    number
        .checked_mul(scale)
        .ok_or_else(|| format!("size out of range: {input:?}"))
}

/// Render a byte count using the largest unit that divides it evenly.
pub fn format_size(bytes: usize) -> String {
    for &(suffix, scale) in SIZE_UNITS {
        if scale > 1 && bytes >= scale && bytes % scale == 0 {
            return format!("{} {}", bytes / scale, suffix);
        }
    }
    format!("{} bytes", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("64MB").unwrap(), 64 * 1024 * 1024);
        assert_eq!(parse_size("4GB").unwrap(), 4 * 1024 * 1024 * 1024);
        // Units are case-insensitive, single-letter forms included.
        assert_eq!(parse_size("2g").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("512 kb").unwrap(), 512 * 1024);
        assert!(parse_size("").is_err());
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(160 * 1024 * 1024), "160 MB");
        assert_eq!(format_size(16 * 1024 * 1024), "16 MB");
        assert_eq!(format_size(1000), "1000 bytes");
    }

    #[test]
    fn test_defaults_match_stock_deployment() {
        let config = Config::default();
        assert_eq!(config.listener.address.port(), 11211);
        assert_eq!(config.cache.max_bytes, 160 * 1024 * 1024);
        assert_eq!(config.workers.queue_depth, 1024);
        assert!(config.core_workers() >= 1);
        assert!(config.max_workers() >= config.core_workers());
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [listener]
            address = "127.0.0.1:11311"

            [cache]
            max_bytes = "32MB"

            [workers]
            core_threads = 2
            max_threads = 4
            queue_depth = 64

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.address.port(), 11311);
        assert_eq!(config.cache.max_bytes, 32 * 1024 * 1024);
        assert_eq!(config.core_workers(), 2);
        assert_eq!(config.max_workers(), 4);
        assert_eq!(config.workers.queue_depth, 64);
        assert_eq!(config.logging.format, LogFormat::Json);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_tiny_budget() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            max_bytes = "1MB"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [cache]
            max_bytes = "32MB"
            mystery_knob = true
            "#,
        );
        assert!(result.is_err());
    }
}
