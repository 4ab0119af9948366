use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use pangolin_core::DEFAULT_SOCKET_PATH;

use super::error::{ConfigError, Result};
use super::persisted::PersistedConfig;
use super::resolver::{ConfigResolver, parse_duration};

pub const DEFAULT_MTU: u32 = 1280;
pub const DEFAULT_DNS: &str = "8.8.8.8";
pub const DEFAULT_INTERFACE_NAME: &str = "olm";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_ENABLE_API: bool = true;
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HOLEPUNCH: bool = false;
pub const DEFAULT_PROTOCOL_VERSION: &str = "1";
pub const DEFAULT_OLM_BINARY: &str = "olm";

/// Flags accepted by `up client`.
///
/// Every optional flag is `None` unless it was given on the command line, so
/// "was this flag set" travels with the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct ClientArgs {
    /// Client ID (required)
    #[arg(long)]
    pub id: Option<String>,

    /// Client secret (required)
    #[arg(long)]
    pub secret: Option<String>,

    /// Client endpoint (defaults to hostname from config)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// MTU (default: 1280)
    #[arg(long)]
    pub mtu: Option<u32>,

    /// DNS server (default: 8.8.8.8)
    #[arg(long)]
    pub dns: Option<String>,

    /// Interface name (default: olm)
    #[arg(long)]
    pub interface_name: Option<String>,

    /// Log level (default: info)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable the client's HTTP API (default: true)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub enable_api: Option<bool>,

    /// HTTP address for the client's API
    #[arg(long)]
    pub http_addr: Option<String>,

    /// Control socket path (default: /var/run/olm.sock)
    #[arg(long)]
    pub socket_path: Option<PathBuf>,

    /// Ping interval (default: 5s)
    #[arg(long)]
    pub ping_interval: Option<String>,

    /// Ping timeout (default: 5s)
    #[arg(long)]
    pub ping_timeout: Option<String>,

    /// Enable hole punching (default: false)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub holepunch: Option<bool>,

    /// TLS client certificate path
    #[arg(long)]
    pub tls_client_cert: Option<String>,

    /// Protocol version (default: 1)
    #[arg(long = "version")]
    pub protocol_version: Option<String>,

    /// Tunnel client executable (default: olm on PATH)
    #[arg(long)]
    pub olm_binary: Option<String>,

    /// Run in detached mode (background)
    #[arg(short = 'd', long)]
    pub detached: bool,

    /// Path to log file (defaults to ~/.pangolin/logs/client.log when detached)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ClientArgs {
    /// The identity pair, rejecting missing or empty values.
    pub fn identity(&self) -> Result<(&str, &str)> {
        let id = non_empty(self.id.as_deref()).ok_or(ConfigError::MissingRequired("--id"))?;
        let secret =
            non_empty(self.secret.as_deref()).ok_or(ConfigError::MissingRequired("--secret"))?;
        Ok((id, secret))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Control socket path: flag, then `olm_defaults.socket_path`, then the default.
pub fn resolve_socket_path(flag: Option<&PathBuf>, config: &PersistedConfig) -> PathBuf {
    let resolver = ConfigResolver::new(config);
    match flag {
        Some(path) if !path.as_os_str().is_empty() => path.clone(),
        _ => PathBuf::from(resolver.string(None, "socket_path", DEFAULT_SOCKET_PATH)),
    }
}

/// Client log level: flag, then `olm_defaults.log_level`, then `info`.
pub fn resolve_log_level(flag: Option<&str>, config: &PersistedConfig) -> String {
    ConfigResolver::new(config).string(flag, "log_level", DEFAULT_LOG_LEVEL)
}

/// Fully resolved settings for one client run.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientStartParameters {
    pub id: String,
    pub secret: String,
    pub endpoint: String,
    pub mtu: u32,
    pub dns: String,
    pub interface_name: String,
    pub log_level: String,
    pub enable_api: bool,
    pub http_addr: String,
    pub socket_path: PathBuf,
    pub ping_interval: String,
    pub ping_interval_duration: Duration,
    pub ping_timeout: String,
    pub ping_timeout_duration: Duration,
    pub holepunch: bool,
    pub tls_client_cert: Option<String>,
    pub version: String,
    pub olm_binary: String,
    pub detached: bool,
    pub log_file: Option<PathBuf>,
}

impl ClientStartParameters {
    pub fn resolve(args: &ClientArgs, config: &PersistedConfig) -> Result<Self> {
        let (id, secret) = args.identity()?;
        let r = ConfigResolver::new(config);

        let endpoint = match non_empty(args.endpoint.as_deref()) {
            Some(endpoint) => endpoint.to_string(),
            None => ConfigResolver::with_section(config, "").string(None, "hostname", ""),
        };

        let ping_interval = r.string(args.ping_interval.as_deref(), "ping_interval", "5s");
        let ping_timeout = r.string(args.ping_timeout.as_deref(), "ping_timeout", "5s");

        Ok(Self {
            id: id.to_string(),
            secret: secret.to_string(),
            endpoint,
            mtu: r.resolve(args.mtu, "mtu", DEFAULT_MTU),
            dns: r.string(args.dns.as_deref(), "dns", DEFAULT_DNS),
            interface_name: r.string(
                args.interface_name.as_deref(),
                "interface_name",
                DEFAULT_INTERFACE_NAME,
            ),
            log_level: resolve_log_level(args.log_level.as_deref(), config),
            enable_api: r.resolve(args.enable_api, "enable_api", DEFAULT_ENABLE_API),
            http_addr: r.string(args.http_addr.as_deref(), "http_addr", ""),
            socket_path: resolve_socket_path(args.socket_path.as_ref(), config),
            ping_interval_duration: parse_duration(&ping_interval, DEFAULT_PING_INTERVAL),
            ping_interval,
            ping_timeout_duration: parse_duration(&ping_timeout, DEFAULT_PING_TIMEOUT),
            ping_timeout,
            holepunch: r.resolve(args.holepunch, "holepunch", DEFAULT_HOLEPUNCH),
            tls_client_cert: r
                .resolve_optional(args.tls_client_cert.clone(), "tls_client_cert")
                .filter(|s| !s.is_empty()),
            version: r.string(
                args.protocol_version.as_deref(),
                "version",
                DEFAULT_PROTOCOL_VERSION,
            ),
            olm_binary: r.string(args.olm_binary.as_deref(), "olm_binary", DEFAULT_OLM_BINARY),
            detached: args.detached,
            log_file: args.log_file.clone(),
        })
    }
}

impl fmt::Debug for ClientStartParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStartParameters")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("mtu", &self.mtu)
            .field("dns", &self.dns)
            .field("interface_name", &self.interface_name)
            .field("log_level", &self.log_level)
            .field("enable_api", &self.enable_api)
            .field("http_addr", &self.http_addr)
            .field("socket_path", &self.socket_path)
            .field("ping_interval", &self.ping_interval_duration)
            .field("ping_timeout", &self.ping_timeout_duration)
            .field("holepunch", &self.holepunch)
            .field("tls_client_cert", &self.tls_client_cert)
            .field("version", &self.version)
            .field("olm_binary", &self.olm_binary)
            .field("detached", &self.detached)
            .field("log_file", &self.log_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ClientArgs {
        ClientArgs {
            id: Some("olm_123".to_string()),
            secret: Some("s3cret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn resolve_fills_compiled_defaults() {
        let params = ClientStartParameters::resolve(&identity(), &PersistedConfig::default())
            .unwrap();
        assert_eq!(params.mtu, 1280);
        assert_eq!(params.dns, "8.8.8.8");
        assert_eq!(params.interface_name, "olm");
        assert_eq!(params.log_level, "info");
        assert!(params.enable_api);
        assert!(!params.holepunch);
        assert_eq!(params.socket_path, PathBuf::from("/var/run/olm.sock"));
        assert_eq!(params.ping_interval, "5s");
        assert_eq!(params.ping_interval_duration, Duration::from_secs(5));
        assert_eq!(params.version, "1");
        assert_eq!(params.endpoint, "");
        assert_eq!(params.tls_client_cert, None);
        assert_eq!(params.olm_binary, "olm");
    }

    #[test]
    fn resolve_prefers_flags_then_config() {
        let config = PersistedConfig::parse(
            r#"
hostname = "pangolin.example.com"

[olm_defaults]
mtu = 1380
dns = "9.9.9.9"
ping_interval = "10s"
socket_path = "/run/olm/olm.sock"
"#,
        )
        .unwrap();
        let args = ClientArgs {
            dns: Some("1.1.1.1".to_string()),
            ping_timeout: Some("2s".to_string()),
            ..identity()
        };

        let params = ClientStartParameters::resolve(&args, &config).unwrap();
        assert_eq!(params.endpoint, "pangolin.example.com");
        assert_eq!(params.mtu, 1380);
        assert_eq!(params.dns, "1.1.1.1");
        assert_eq!(params.ping_interval_duration, Duration::from_secs(10));
        assert_eq!(params.ping_timeout_duration, Duration::from_secs(2));
        assert_eq!(params.socket_path, PathBuf::from("/run/olm/olm.sock"));
    }

    #[test]
    fn invalid_duration_keeps_string_but_uses_fallback() {
        let args = ClientArgs {
            ping_interval: Some("often".to_string()),
            ..identity()
        };
        let params = ClientStartParameters::resolve(&args, &PersistedConfig::default()).unwrap();
        assert_eq!(params.ping_interval, "often");
        assert_eq!(params.ping_interval_duration, DEFAULT_PING_INTERVAL);
    }

    #[test]
    fn resolve_requires_identity() {
        let err = ClientStartParameters::resolve(&ClientArgs::default(), &PersistedConfig::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "--id is required");

        let args = ClientArgs {
            secret: Some(String::new()),
            ..identity()
        };
        let err = ClientStartParameters::resolve(&args, &PersistedConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "--secret is required");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let params = ClientStartParameters::resolve(&identity(), &PersistedConfig::default())
            .unwrap();
        let debug = format!("{params:?}");
        assert!(debug.contains("olm_123"));
        assert!(!debug.contains("s3cret"));
    }
}
