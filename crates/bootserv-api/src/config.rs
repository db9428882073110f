//! # Command-Line Configuration
//!
//! Every flag can also come from the environment, so the server runs the
//! same way under systemd, in a container or from a shell.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::state::{AppConfig, DEFAULT_ARTIFACT_URL_TEMPLATE, DEFAULT_MAX_ARTIFACT_SIZE};

/// Bootstrap server for the overlay network.
#[derive(Parser, Debug)]
#[command(name = "bootserv-api", version, about)]
pub struct ServerArgs {
    /// Data root holding `token`, `nodedb/` and `bin/`.
    #[arg(long, env = "BOOTSERV_ROOT", default_value = bootserv_core::DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Address to listen on.
    #[arg(long, env = "BOOTSERV_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Name of the cached artifact, served at `/<name>`.
    #[arg(long, env = "BOOTSERV_ARTIFACT_NAME", default_value = "lokinet")]
    pub artifact_name: String,

    /// Download URL pattern for a CI job's artifact.
    #[arg(long, env = "BOOTSERV_ARTIFACT_URL_TEMPLATE", default_value = DEFAULT_ARTIFACT_URL_TEMPLATE)]
    pub artifact_url_template: String,

    /// API token sent to CI when downloading artifacts.
    #[arg(long, env = "BOOTSERV_CI_API_TOKEN", hide_env_values = true)]
    pub ci_api_token: Option<String>,

    /// Timeout for one artifact download, in seconds.
    #[arg(long, env = "BOOTSERV_FETCH_TIMEOUT_SECS", default_value_t = 120)]
    pub fetch_timeout_secs: u64,

    /// Refuse artifact downloads larger than this many bytes.
    #[arg(long, env = "BOOTSERV_MAX_ARTIFACT_BYTES", default_value_t = DEFAULT_MAX_ARTIFACT_SIZE)]
    pub max_artifact_bytes: u64,

    /// Run a prune pass every this many seconds. 0 disables it.
    #[arg(long, env = "BOOTSERV_PRUNE_INTERVAL_SECS", default_value_t = 0)]
    pub prune_interval_secs: u64,

    /// How long a router contact stays valid after signing, in seconds.
    #[arg(long, env = "BOOTSERV_RC_LIFETIME_SECS", default_value_t = 86_400)]
    pub rc_lifetime_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long, env = "BOOTSERV_JSON_LOGS")]
    pub json_logs: bool,
}

impl ServerArgs {
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            root: self.root.clone(),
            bind: self.bind,
            port: self.port,
            artifact_name: self.artifact_name.clone(),
            artifact_url_template: self.artifact_url_template.clone(),
            ci_api_token: self.ci_api_token.clone().filter(|t| !t.is_empty()),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_artifact_size: self.max_artifact_bytes,
            prune_interval: (self.prune_interval_secs > 0)
                .then(|| Duration::from_secs(self.prune_interval_secs)),
            rc_lifetime: Duration::from_secs(self.rc_lifetime_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = ServerArgs::try_parse_from(["bootserv-api"]).unwrap();
        let config = args.to_config();
        assert_eq!(config.port, 8080);
        assert_eq!(config.artifact_name, "lokinet");
        assert_eq!(config.fetch_timeout, Duration::from_secs(120));
        assert_eq!(config.max_artifact_size, DEFAULT_MAX_ARTIFACT_SIZE);
        assert!(config.prune_interval.is_none());
        assert_eq!(config.rc_lifetime, Duration::from_secs(86_400));
    }

    #[test]
    fn flags_override_defaults() {
        let args = ServerArgs::try_parse_from([
            "bootserv-api",
            "--root",
            "/tmp/boot",
            "--port",
            "9000",
            "--bind",
            "127.0.0.1",
            "--artifact-name",
            "lokinet-linux",
            "--prune-interval-secs",
            "600",
            "--max-artifact-bytes",
            "1048576",
            "--json-logs",
        ])
        .unwrap();
        assert!(args.json_logs);
        let config = args.to_config();
        assert_eq!(config.root, PathBuf::from("/tmp/boot"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind.to_string(), "127.0.0.1");
        assert_eq!(config.artifact_name, "lokinet-linux");
        assert_eq!(config.prune_interval, Some(Duration::from_secs(600)));
        assert_eq!(config.max_artifact_size, 1_048_576);
    }

    #[test]
    fn empty_ci_token_counts_as_unset() {
        let args =
            ServerArgs::try_parse_from(["bootserv-api", "--ci-api-token", ""]).unwrap();
        assert!(args.to_config().ci_api_token.is_none());
    }
}
