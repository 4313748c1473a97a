//! Server configuration from command-line flags and environment variables.
//!
//! Every flag falls back to an environment variable, so the server can be
//! configured entirely from a `.env`-style deployment:
//!
//! | Variable | Default |
//! |---|---|
//! | `UMBRELLA_BIND_ADDR` | `0.0.0.0:5050` |
//! | `UMBRELLA_STORE` | `sqlite` |
//! | `UMBRELLA_DATABASE_PATH` | `umbrella.db` |
//! | `SUPABASE_URL`, `SUPABASE_KEY` | required when the store is `supabase` |
//! | `UMBRELLA_LOG_FORMAT` | `plain` |
//! | `UMBRELLA_STEP_DELAY_MS` | `500` |
//! | `UMBRELLA_RETAP_DELAY_MS` | `1000` |
//! | `UMBRELLA_EVENT_CAPACITY` | `64` |
//! | `UMBRELLA_AUTO_START` | `false` |

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;
use umbrella_core::{Error, Result};
use umbrella_reader::ReaderConfig;
use umbrella_reader::events::DEFAULT_EVENT_CAPACITY;
use umbrella_storage::{DatabaseConfig, SupabaseConfig};

/// Which table store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Embedded SQLite database file.
    Sqlite,
    /// Remote Supabase project (PostgREST).
    Supabase,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "umbrella-server")]
#[command(version, about = "Umbrella lending desk: NFC reader pipeline with HTTP and WebSocket API", long_about = None)]
pub struct ServerConfig {
    /// Address to serve HTTP and WebSocket on
    #[arg(long, env = "UMBRELLA_BIND_ADDR", default_value = "0.0.0.0:5050")]
    pub bind_addr: SocketAddr,

    /// Table store backend
    #[arg(long, env = "UMBRELLA_STORE", value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    /// SQLite database file (sqlite store only)
    #[arg(long, env = "UMBRELLA_DATABASE_PATH", default_value = "umbrella.db")]
    pub database_path: String,

    /// Supabase project URL (supabase store only)
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase API key (supabase store only)
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Log output format
    #[arg(long, env = "UMBRELLA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Pacing delay between processing steps, in milliseconds
    #[arg(long, env = "UMBRELLA_STEP_DELAY_MS", default_value_t = 500)]
    pub step_delay_ms: u64,

    /// Delay before asking a student to tap again, in milliseconds
    #[arg(long, env = "UMBRELLA_RETAP_DELAY_MS", default_value_t = 1000)]
    pub retap_delay_ms: u64,

    /// Events buffered per WebSocket client before it starts skipping
    #[arg(long, env = "UMBRELLA_EVENT_CAPACITY", default_value_t = DEFAULT_EVENT_CAPACITY)]
    pub event_capacity: usize,

    /// Start the reader loop as soon as the server is up
    #[arg(long, env = "UMBRELLA_AUTO_START", default_value_t = false)]
    pub auto_start: bool,
}

impl ServerConfig {
    /// Check settings clap cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if Supabase is selected without credentials, or if
    /// the event capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::Config(
                "UMBRELLA_EVENT_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.store == StoreKind::Supabase {
            self.supabase_config()?;
        }
        Ok(())
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::default()
            .step_delay(Duration::from_millis(self.step_delay_ms))
            .retap_delay(Duration::from_millis(self.retap_delay_ms))
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_path.clone())
    }

    /// Supabase connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfig`] naming the first unset or blank
    /// variable.
    pub fn supabase_config(&self) -> Result<SupabaseConfig> {
        let url = required(self.supabase_url.as_deref(), "SUPABASE_URL")?;
        let key = required(self.supabase_key.as_deref(), "SUPABASE_KEY")?;
        Ok(SupabaseConfig::new(url, key))
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::MissingConfig(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["umbrella-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.bind_addr, "0.0.0.0:5050".parse().unwrap());
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.database_path, "umbrella.db");
        assert_eq!(config.log_format, LogFormat::Plain);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert!(!config.auto_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reader_timing_flags() {
        let config = parse(&["--step-delay-ms", "10", "--retap-delay-ms", "20"]);
        let reader = config.reader_config();

        assert_eq!(reader.step_delay, Duration::from_millis(10));
        assert_eq!(reader.retap_delay, Duration::from_millis(20));
        assert_eq!(reader.acquire_attempts, ReaderConfig::default().acquire_attempts);
    }

    #[test]
    fn test_supabase_requires_credentials() {
        let config = parse(&["--store", "supabase", "--supabase-url", "https://x.supabase.co"]);

        assert_eq!(
            config.validate().unwrap_err(),
            Error::MissingConfig("SUPABASE_KEY".to_string())
        );
    }

    #[test]
    fn test_blank_supabase_url_is_missing() {
        let config = parse(&["--store", "supabase", "--supabase-url", " ", "--supabase-key", "k"]);

        assert_eq!(
            config.supabase_config().unwrap_err(),
            Error::MissingConfig("SUPABASE_URL".to_string())
        );
    }

    #[test]
    fn test_supabase_with_credentials() {
        let config = parse(&[
            "--store",
            "supabase",
            "--supabase-url",
            "https://x.supabase.co",
            "--supabase-key",
            "anon-key",
        ]);

        assert!(config.validate().is_ok());
        assert!(config.supabase_config().unwrap().validate().is_ok());
    }

    #[test]
    fn test_zero_event_capacity_is_rejected() {
        let config = parse(&["--event-capacity", "0"]);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_store_is_rejected() {
        assert!(ServerConfig::try_parse_from(["umbrella-server", "--store", "mysql"]).is_err());
    }
}
