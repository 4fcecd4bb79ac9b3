//! Environment-variable configuration (spec.md §3 "Configuration").
//!
//! Loaded once at startup the way bindy's `main.rs` reads `RUST_LOG_FORMAT`/
//! `BINDY_KUBE_QPS`/etc. directly from `std::env::var` rather than through a
//! `clap`/`config`-crate indirection — this crate keeps the same texture but
//! collects the reads into one `Config::from_env` so `main.rs` stays thin.

use crate::constants::{
    DEFAULT_DOCKER_HOST, DEFAULT_RECORD_TTL_SECS, ENV_BACKEND, ENV_BASE_DOMAIN,
    ENV_DOCKER_HOST, ENV_ENABLE_METRICS, ENV_HOSTNAME, ENV_HOST_IP_ADDRESS, ENV_IPV6_ONLY,
    ENV_LOG_LEVEL, ENV_RECORD_TTL, MAX_RECORD_TTL_SECS, METRICS_SERVER_PORT,
};
use crate::errors::ConfigError;
use hickory_proto::rr::Name;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Which backend variant to construct, plus that variant's own connection
/// details (spec.md §4.5, one struct per backend).
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Route53 {
        hosted_zone_id: String,
    },
    Sql {
        database_url: String,
        table: String,
    },
    EtagCloud {
        base_url: String,
        api_token: String,
        zone_id: String,
    },
    LogOnly,
}

/// Fully validated process configuration (spec.md §3).
#[derive(Debug, Clone)]
pub struct Config {
    /// Short hostname (no dots) identifying this host within the zone.
    pub hostname: String,
    pub base_domain: Name,
    pub backend: BackendConfig,
    pub log_level: String,
    pub ipv6_only: bool,
    pub enable_metrics: bool,
    pub metrics_port: u16,
    pub record_ttl: u32,
    pub host_ip_address: Option<Ipv4Addr>,
    pub docker_host: String,
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional_var(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" => Ok(false),
        "true" | "1" | "yes" => Ok(true),
        other => Err(ConfigError::InvalidValue {
            var,
            value: other.to_string(),
            reason: "expected true/false".to_string(),
        }),
    }
}

impl Config {
    /// Load and validate configuration from the process environment
    /// (spec.md §3). The only fatal path in the agent: on error the caller
    /// logs and exits.
    pub fn from_env() -> Result<Self, ConfigError> {
        let hostname = require_var(ENV_HOSTNAME)?;
        if hostname.contains('.') {
            return Err(ConfigError::HostnameHasDot {
                var: ENV_HOSTNAME,
                value: hostname,
            });
        }

        let base_domain_raw = require_var(ENV_BASE_DOMAIN)?;
        let base_domain = Name::from_str(&base_domain_raw).map_err(|e| ConfigError::InvalidValue {
            var: ENV_BASE_DOMAIN,
            value: base_domain_raw.clone(),
            reason: e.to_string(),
        })?;

        let backend_name = require_var(ENV_BACKEND)?;
        let backend = Self::backend_from_env(&backend_name)?;

        let log_level = optional_var(ENV_LOG_LEVEL, "info");

        let ipv6_only_raw = optional_var(ENV_IPV6_ONLY, "false");
        let ipv6_only = parse_bool(ENV_IPV6_ONLY, &ipv6_only_raw)?;

        let enable_metrics_raw = optional_var(ENV_ENABLE_METRICS, "false");
        let enable_metrics = parse_bool(ENV_ENABLE_METRICS, &enable_metrics_raw)?;

        let record_ttl_raw = optional_var(ENV_RECORD_TTL, &DEFAULT_RECORD_TTL_SECS.to_string());
        let record_ttl: u32 = record_ttl_raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: ENV_RECORD_TTL,
            value: record_ttl_raw.clone(),
            reason: "expected an integer".to_string(),
        })?;
        if record_ttl > MAX_RECORD_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                var: ENV_RECORD_TTL,
                value: record_ttl_raw,
                reason: format!("must be at most {MAX_RECORD_TTL_SECS}"),
            });
        }

        let host_ip_raw = optional_var(ENV_HOST_IP_ADDRESS, "");
        let host_ip_address = if host_ip_raw.is_empty() {
            None
        } else {
            Some(
                host_ip_raw
                    .parse::<Ipv4Addr>()
                    .map_err(|e| ConfigError::InvalidValue {
                        var: ENV_HOST_IP_ADDRESS,
                        value: host_ip_raw,
                        reason: e.to_string(),
                    })?,
            )
        };

        let docker_host = optional_var(ENV_DOCKER_HOST, DEFAULT_DOCKER_HOST);

        Ok(Self {
            hostname,
            base_domain,
            backend,
            log_level,
            ipv6_only,
            enable_metrics,
            metrics_port: METRICS_SERVER_PORT,
            record_ttl,
            host_ip_address,
            docker_host,
        })
    }

    fn backend_from_env(name: &str) -> Result<BackendConfig, ConfigError> {
        match name {
            "route53" => Ok(BackendConfig::Route53 {
                hosted_zone_id: require_var("ROUTE53_HOSTED_ZONE_ID")?,
            }),
            "sql" => Ok(BackendConfig::Sql {
                database_url: require_var("SQL_DATABASE_URL")?,
                table: optional_var("SQL_TABLE", "dns_records"),
            }),
            "etag-cloud" => Ok(BackendConfig::EtagCloud {
                base_url: require_var("ETAG_CLOUD_BASE_URL")?,
                api_token: require_var("ETAG_CLOUD_API_TOKEN")?,
                zone_id: require_var("ETAG_CLOUD_ZONE_ID")?,
            }),
            "log-only" => Ok(BackendConfig::LogOnly),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests can't run concurrently with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for var in [
            ENV_HOSTNAME,
            ENV_BASE_DOMAIN,
            ENV_BACKEND,
            ENV_LOG_LEVEL,
            ENV_IPV6_ONLY,
            ENV_ENABLE_METRICS,
            ENV_RECORD_TTL,
            ENV_HOST_IP_ADDRESS,
            ENV_DOCKER_HOST,
            "ROUTE53_HOSTED_ZONE_ID",
            "SQL_DATABASE_URL",
            "SQL_TABLE",
            "ETAG_CLOUD_BASE_URL",
            "ETAG_CLOUD_API_TOKEN",
            "ETAG_CLOUD_ZONE_ID",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn missing_hostname_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_HOSTNAME)));
    }

    #[test]
    fn hostname_with_dot_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var(ENV_HOSTNAME, "host1.lan");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::HostnameHasDot { .. }));
    }

    #[test]
    fn minimal_log_only_config_loads_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var(ENV_HOSTNAME, "host1");
        std::env::set_var(ENV_BASE_DOMAIN, "lan.example.com");
        std::env::set_var(ENV_BACKEND, "log-only");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.hostname, "host1");
        assert_eq!(cfg.record_ttl, DEFAULT_RECORD_TTL_SECS);
        assert!(!cfg.ipv6_only);
        assert!(matches!(cfg.backend, BackendConfig::LogOnly));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var(ENV_HOSTNAME, "host1");
        std::env::set_var(ENV_BASE_DOMAIN, "lan.example.com");
        std::env::set_var(ENV_BACKEND, "carrier-pigeon");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(_)));
    }

    #[test]
    fn record_ttl_above_max_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var(ENV_HOSTNAME, "host1");
        std::env::set_var(ENV_BASE_DOMAIN, "lan.example.com");
        std::env::set_var(ENV_BACKEND, "log-only");
        std::env::set_var(ENV_RECORD_TTL, "99999999999");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: ENV_RECORD_TTL, .. }));
    }

    #[test]
    fn sql_backend_requires_database_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var(ENV_HOSTNAME, "host1");
        std::env::set_var(ENV_BASE_DOMAIN, "lan.example.com");
        std::env::set_var(ENV_BACKEND, "sql");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SQL_DATABASE_URL")));
    }
}
