use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::{Backpressure, Options};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const BINARY_NAME: &str = "broadcast_server";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Channels to create at startup, before any subscriber asks for them.
    #[arg(long, env, value_delimiter = ',', use_value_delimiter = true)]
    pub channels: Vec<String>,

    /// Number of messages each subscriber's mailbox holds before backpressure applies
    #[arg(long, env, default_value_t = sse::options::DEFAULT_MAILBOX_CAPACITY)]
    pub mailbox_capacity: usize,

    /// What publishing does when a subscriber's mailbox is full: wait for it (block)
    /// or drop the subscriber (disconnect).
    #[arg(
        long,
        env,
        default_value_t = Backpressure::Block,
        value_parser = clap::builder::PossibleValuesParser::new([
            "BLOCK", "DISCONNECT", "block", "disconnect"
        ])
            .map(|s| s.parse::<Backpressure>().unwrap()),
    )]
    pub backpressure: Backpressure,

    /// Reconnection delay in milliseconds sent to browsers with every event
    #[arg(long, env)]
    pub retry_interval_ms: Option<u64>,

    /// Seconds between keep-alive comments on idle event streams
    #[arg(long, env, default_value_t = 15)]
    pub keep_alive_secs: u64,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    /// Reads settings from the environment only, ignoring process arguments.
    fn default() -> Self {
        Config::parse_from([BINARY_NAME])
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    /// The `interface:port` pair the HTTP listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.interface(), self.port)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }

    pub fn retry_interval(&self) -> Option<Duration> {
        self.retry_interval_ms.map(Duration::from_millis)
    }

    /// Broadcast engine options derived from this configuration.
    pub fn sse_options(&self) -> Options {
        Options::default()
            .with_mailbox_capacity(self.mailbox_capacity)
            .with_backpressure(self.backpressure)
            .with_retry(self.retry_interval())
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_settings() {
        let config = Config::parse_from([
            BINARY_NAME,
            "--mailbox-capacity",
            "4",
            "--backpressure",
            "disconnect",
            "--retry-interval-ms",
            "2500",
            "--channels",
            "news,sports",
        ]);

        let options = config.sse_options();
        assert_eq!(options.mailbox_capacity, 4);
        assert_eq!(options.backpressure, Backpressure::Disconnect);
        assert_eq!(options.retry, Some(Duration::from_millis(2500)));
        assert_eq!(config.channels, vec!["news", "sports"]);
    }

    #[test]
    fn test_bind_address_uses_interface_and_port() {
        let config = Config::parse_from([BINARY_NAME, "--interface", "0.0.0.0", "--port", "8081"]);
        assert_eq!(config.bind_address(), "0.0.0.0:8081");
    }

    #[test]
    fn test_keep_alive_is_never_zero() {
        let config = Config::parse_from([BINARY_NAME, "--keep-alive-secs", "0"]);
        assert_eq!(config.keep_alive(), Duration::from_secs(1));
    }

    #[test]
    fn test_rust_env_round_trips_through_display() {
        assert_eq!("PRODUCTION".parse(), Ok(RustEnv::Production));
        assert_eq!(RustEnv::Staging.to_string(), "staging");
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
    }
}
