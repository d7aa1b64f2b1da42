//! Command-line and environment configuration

use crate::telemetry::LogFormat;
use clap::Parser;
use std::time::Duration;

/// Simulated payment-processing endpoint speaking a line-based TCP protocol
#[derive(Debug, Clone, Parser)]
#[command(name = "payment-server", version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PAYMENT_SIMULATOR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// TCP port to listen on (0 picks a free port)
    #[arg(short, long, env = "PAYMENT_SIMULATOR_PORT", default_value_t = 8080)]
    pub port: u16,

    /// How long in-flight requests may run after a shutdown signal
    #[arg(
        short,
        long,
        env = "PAYMENT_SIMULATOR_GRACE_PERIOD_MS",
        default_value_t = 5000
    )]
    pub grace_period_ms: u64,

    /// Log level (trace, debug, info, warn, error) or a tracing filter
    #[arg(short, long, env = "PAYMENT_SIMULATOR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, env = "PAYMENT_SIMULATOR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Config {
    /// `host:port` in the form accepted by the listener factory
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["payment-server"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.grace_period(), Duration::from_secs(5));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "payment-server",
            "--host",
            "0.0.0.0",
            "-p",
            "9000",
            "--grace-period-ms",
            "250",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(config.address(), "0.0.0.0:9000");
        assert_eq!(config.grace_period(), Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_invalid_port() {
        assert!(Config::try_parse_from(["payment-server", "--port", "70000"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
