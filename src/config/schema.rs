//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Planes, pools and listeners.
    pub server: ServerConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Metrics settings.
    pub metrics: MetricsConfig,
}

/// Server factory configuration.
///
/// The application plane runs on the server's own pool (`min_threads` /
/// `max_threads`); the admin plane always gets a dedicated pool sized by
/// `admin_min_threads` / `admin_max_threads`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listeners serving application traffic.
    pub application_listeners: Vec<ListenerSpec>,

    /// Listeners serving admin endpoints.
    pub admin_listeners: Vec<ListenerSpec>,

    /// Minimum (core) threads of the application pool.
    pub min_threads: usize,

    /// Maximum threads of the application pool.
    pub max_threads: usize,

    /// Minimum (core) threads of the admin pool.
    pub admin_min_threads: usize,

    /// Maximum threads of the admin pool.
    pub admin_max_threads: usize,

    /// How long in-flight connections get to finish on shutdown.
    pub shutdown_grace_period_secs: u64,

    /// Keep an explicitly empty listener list empty instead of substituting
    /// the plane's default listener. At least one plane must still listen.
    pub allow_empty_planes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_listeners: vec![ListenerSpec::application()],
            admin_listeners: vec![ListenerSpec::admin()],
            min_threads: 8,
            max_threads: 1024,
            admin_min_threads: 1,
            admin_max_threads: 64,
            shutdown_grace_period_secs: 30,
            allow_empty_planes: false,
        }
    }
}

/// Declarative description of one listener.
///
/// ```toml
/// [[server.application_listeners]]
/// type = "https"
/// port = 8443
/// cert_path = "/etc/tls/cert.pem"
/// key_path = "/etc/tls/key.pem"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListenerSpec {
    /// Plain HTTP/1.1 + HTTP/2 (h2c) over TCP.
    Http(HttpListenerSpec),
    /// HTTP over TLS.
    Https(HttpsListenerSpec),
}

impl ListenerSpec {
    /// Default application listener: plain HTTP on port 8080.
    pub fn application() -> Self {
        ListenerSpec::Http(HttpListenerSpec::with_port(8080))
    }

    /// Default admin listener: plain HTTP on port 8081.
    pub fn admin() -> Self {
        ListenerSpec::Http(HttpListenerSpec::with_port(8081))
    }

    /// Socket-level settings shared by every transport.
    pub fn http(&self) -> &HttpListenerSpec {
        match self {
            ListenerSpec::Http(spec) => spec,
            ListenerSpec::Https(spec) => &spec.http,
        }
    }

    /// Transport name, as written in config files.
    pub fn kind(&self) -> &'static str {
        match self {
            ListenerSpec::Http(_) => "http",
            ListenerSpec::Https(_) => "https",
        }
    }
}

/// Socket and connection settings of a listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpListenerSpec {
    /// Host or IP to bind. `None` binds all interfaces.
    pub bind_host: Option<String>,

    /// Port to bind. `0` picks an ephemeral port.
    pub port: u16,

    /// Listen backlog.
    pub accept_queue_size: u32,

    /// Set `SO_REUSEADDR` before binding.
    pub reuse_address: bool,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Time allowed for a client to send request headers, in seconds.
    pub idle_timeout_secs: u64,
}

impl HttpListenerSpec {
    /// Defaults bound to the given port.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// The host part of the bind address.
    pub fn host(&self) -> &str {
        self.bind_host.as_deref().unwrap_or("0.0.0.0")
    }
}

impl Default for HttpListenerSpec {
    fn default() -> Self {
        Self {
            bind_host: None,
            port: 8080,
            accept_queue_size: 1024,
            reuse_address: true,
            max_connections: 10_000,
            idle_timeout_secs: 30,
        }
    }
}

/// TLS listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpsListenerSpec {
    /// Socket settings.
    #[serde(flatten)]
    pub http: HttpListenerSpec,

    /// Path to certificate chain (PEM).
    pub cert_path: PathBuf,

    /// Path to private key (PEM).
    pub key_path: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` directive). `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve it on the admin plane.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_one_listener_per_plane() {
        let config = ServerConfig::default();
        assert_eq!(config.application_listeners, vec![ListenerSpec::application()]);
        assert_eq!(config.admin_listeners, vec![ListenerSpec::admin()]);
        assert_eq!(config.admin_min_threads, 1);
        assert_eq!(config.admin_max_threads, 64);
    }

    #[test]
    fn parses_tagged_listeners() {
        let config: Config = toml::from_str(
            r#"
            [server]
            admin_max_threads = 8

            [[server.application_listeners]]
            type = "http"
            bind_host = "127.0.0.1"
            port = 9000

            [[server.application_listeners]]
            type = "https"
            port = 9443
            cert_path = "cert.pem"
            key_path = "key.pem"
            "#,
        )
        .unwrap();

        let app = &config.server.application_listeners;
        assert_eq!(app.len(), 2);
        assert_eq!(app[0].http().host(), "127.0.0.1");
        assert_eq!(app[0].http().port, 9000);
        assert_eq!(app[0].http().max_connections, 10_000);
        assert_eq!(app[1].kind(), "https");
        assert_eq!(app[1].http().port, 9443);
        // Untouched sections keep their defaults.
        assert_eq!(config.server.admin_listeners, vec![ListenerSpec::admin()]);
        assert_eq!(config.server.admin_max_threads, 8);
        assert_eq!(config.server.admin_min_threads, 1);
    }

    #[test]
    fn explicit_empty_list_is_preserved() {
        let config: Config = toml::from_str(
            r#"
            [server]
            admin_listeners = []
            "#,
        )
        .unwrap();
        assert!(config.server.admin_listeners.is_empty());
        assert_eq!(config.server.application_listeners.len(), 1);
    }
}
