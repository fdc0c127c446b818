//! Mediator configuration.
//!
//! Settings come from a Java-style properties file named by
//! `MEDIATOR_PROPERTIES`, overridden by environment variables
//! (`xds.registry.port` becomes `XDS_REGISTRY_PORT`). Everything is
//! validated once, before the server binds.

use crate::error::ConfigError;
use crate::types::AuthorityRef;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the properties file
pub const PROPERTIES_ENV: &str = "MEDIATOR_PROPERTIES";

/// Property keys understood by the mediator
pub mod keys {
    /// Enterprise assigning authority namespace
    pub const ENTERPRISE_AUTHORITY: &str = "pix.requestedAssigningAuthority";
    /// Enterprise assigning authority OID
    pub const ENTERPRISE_AUTHORITY_ID: &str = "pix.requestedAssigningAuthorityId";
    /// Cross-reference file for the static resolver
    pub const XREF_FILE: &str = "pix.xref.file";
    /// Registry URL scheme
    pub const REGISTRY_SCHEME: &str = "xds.registry.scheme";
    /// Registry host
    pub const REGISTRY_HOST: &str = "xds.registry.host";
    /// Registry port
    pub const REGISTRY_PORT: &str = "xds.registry.port";
    /// Registry path
    pub const REGISTRY_PATH: &str = "xds.registry.path";
    /// Mediator name
    pub const NAME: &str = "mediator.name";
    /// Per-request deadline in milliseconds
    pub const REQUEST_TIMEOUT_MS: &str = "mediator.request.timeoutMs";
    /// Listen host
    pub const SERVER_HOST: &str = "mediator.server.host";
    /// Listen port
    pub const SERVER_PORT: &str = "mediator.server.port";
    /// Route serving stored queries
    pub const REGISTRY_ROUTE: &str = "mediator.registry.route";

    /// All keys, for environment overrides
    pub const ALL: &[&str] = &[
        ENTERPRISE_AUTHORITY,
        ENTERPRISE_AUTHORITY_ID,
        XREF_FILE,
        REGISTRY_SCHEME,
        REGISTRY_HOST,
        REGISTRY_PORT,
        REGISTRY_PATH,
        NAME,
        REQUEST_TIMEOUT_MS,
        SERVER_HOST,
        SERVER_PORT,
        REGISTRY_ROUTE,
    ];
}

/// Downstream XDS.b registry endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    /// `http` or `https`
    pub scheme: String,
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
    /// Path, always starting with `/`
    pub path: String,
}

/// Listen address of the HTTP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` string for binding
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Validated, read-only mediator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediatorConfig {
    /// Mediator name, used in logs
    pub name: String,
    /// Authority enterprise identifiers are resolved against
    pub enterprise_authority: AuthorityRef,
    /// Where enriched queries are forwarded
    pub registry: RegistryEndpoint,
    /// Per-request deadline
    pub request_timeout: Duration,
    /// Listen address
    pub server: ServerConfig,
    /// Route serving stored queries
    pub registry_route: String,
    /// Optional `local_cx=enterprise_id` cross-reference file
    pub xref_file: Option<PathBuf>,
}

impl MediatorConfig {
    /// Validates a property map.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] if a required key is absent or empty
    /// - [`ConfigError::Invalid`] if a port, timeout, scheme or route is unusable
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let enterprise_authority = AuthorityRef::new(
            required(properties, keys::ENTERPRISE_AUTHORITY)?,
            required(properties, keys::ENTERPRISE_AUTHORITY_ID)?,
        );

        let scheme = optional(properties, keys::REGISTRY_SCHEME, "http").to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(invalid(keys::REGISTRY_SCHEME, &scheme, "must be http or https"));
        }

        let registry = RegistryEndpoint {
            scheme,
            host: required(properties, keys::REGISTRY_HOST)?,
            port: parse_port(keys::REGISTRY_PORT, &required(properties, keys::REGISTRY_PORT)?)?,
            path: with_leading_slash(required(properties, keys::REGISTRY_PATH)?),
        };

        let timeout_ms = optional(properties, keys::REQUEST_TIMEOUT_MS, "60000");
        let request_timeout = match timeout_ms.parse::<u64>() {
            Ok(0) => return Err(invalid(keys::REQUEST_TIMEOUT_MS, &timeout_ms, "must be greater than zero")),
            Ok(ms) => Duration::from_millis(ms),
            Err(e) => return Err(invalid(keys::REQUEST_TIMEOUT_MS, &timeout_ms, &e.to_string())),
        };

        let server = ServerConfig {
            host: optional(properties, keys::SERVER_HOST, "0.0.0.0"),
            port: parse_port(keys::SERVER_PORT, &optional(properties, keys::SERVER_PORT, "8080"))?,
        };

        let registry_route = optional(properties, keys::REGISTRY_ROUTE, "/xds-registry");
        if !registry_route.starts_with('/') || registry_route == "/health" || registry_route == "/metrics" {
            return Err(invalid(
                keys::REGISTRY_ROUTE,
                &registry_route,
                "must start with '/' and not shadow /health or /metrics",
            ));
        }

        Ok(Self {
            name: optional(properties, keys::NAME, "xds-mediator"),
            enterprise_authority,
            registry,
            request_timeout,
            server,
            registry_route,
            xref_file: lookup(properties, keys::XREF_FILE).map(PathBuf::from),
        })
    }

    /// Loads the properties file named by `MEDIATOR_PROPERTIES` (if set),
    /// applies environment overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut properties = match std::env::var(PROPERTIES_ENV) {
            Ok(path) => read_properties_file(Path::new(&path))?,
            Err(_) => HashMap::new(),
        };

        apply_env_overrides(&mut properties, |name| std::env::var(name).ok());
        Self::from_properties(&properties)
    }
}

/// Reads and parses a properties file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read.
pub fn read_properties_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(parse_properties(&contents))
}

/// Parses `key=value` / `key: value` lines. Blank lines and lines starting
/// with `#` or `!` are skipped; a key without separator gets an empty value.
#[must_use]
pub fn parse_properties(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| match line.find(['=', ':']) {
            Some(idx) => (line[..idx].trim().to_string(), line[idx + 1..].trim().to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

/// Overrides properties from variables named after each key
/// (`.` → `_`, upper-cased).
pub fn apply_env_overrides<F>(properties: &mut HashMap<String, String>, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys::ALL {
        if let Some(value) = lookup(&env_var_name(key)) {
            properties.insert((*key).to_string(), value);
        }
    }
}

/// Environment variable overriding `key`
#[must_use]
pub fn env_var_name(key: &str) -> String {
    key.replace('.', "_").to_ascii_uppercase()
}

fn lookup(properties: &HashMap<String, String>, key: &str) -> Option<String> {
    properties
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required(properties: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    lookup(properties, key).ok_or_else(|| ConfigError::Missing {
        key: key.to_string(),
    })
}

fn optional(properties: &HashMap<String, String>, key: &str, default: &str) -> String {
    lookup(properties, key).unwrap_or_else(|| default.to_string())
}

fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    match value.parse::<u16>() {
        Ok(0) => Err(invalid(key, value, "port must be non-zero")),
        Ok(port) => Ok(port),
        Err(e) => Err(invalid(key, value, &e.to_string())),
    }
}

fn with_leading_slash(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/panic
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base_properties() -> HashMap<String, String> {
        parse_properties(
            "
            # enterprise domain
            pix.requestedAssigningAuthority=ENT
            pix.requestedAssigningAuthorityId = 1.2.3.4
            ! registry
            xds.registry.host: registry.example.org
            xds.registry.port=5000
            xds.registry.path=/xdsregistry
            ",
        )
    }

    #[test]
    fn test_parse_properties_separators_and_comments() {
        let props = parse_properties("a=1\nb: two words\n# c=3\n!d=4\n\ne\nurl=http://x:1/p");
        assert_eq!(props.get("a").map(String::as_str), Some("1"));
        assert_eq!(props.get("b").map(String::as_str), Some("two words"));
        assert_eq!(props.get("e").map(String::as_str), Some(""));
        assert_eq!(props.get("url").map(String::as_str), Some("http://x:1/p"));
        assert!(!props.contains_key("c"));
        assert!(!props.contains_key("!d"));
    }

    #[test]
    fn test_defaults() {
        let config = MediatorConfig::from_properties(&base_properties()).unwrap();

        assert_eq!(config.enterprise_authority, AuthorityRef::new("ENT", "1.2.3.4"));
        assert_eq!(
            config.registry,
            RegistryEndpoint {
                scheme: "http".to_string(),
                host: "registry.example.org".to_string(),
                port: 5000,
                path: "/xdsregistry".to_string(),
            }
        );
        assert_eq!(config.name, "xds-mediator");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.registry_route, "/xds-registry");
        assert_eq!(config.xref_file, None);
    }

    #[test]
    fn test_missing_and_empty_keys() {
        let mut props = base_properties();
        props.remove(keys::REGISTRY_HOST);
        assert_eq!(
            MediatorConfig::from_properties(&props),
            Err(ConfigError::Missing {
                key: keys::REGISTRY_HOST.to_string()
            })
        );

        let mut props = base_properties();
        props.insert(keys::ENTERPRISE_AUTHORITY_ID.to_string(), "   ".to_string());
        assert_eq!(
            MediatorConfig::from_properties(&props),
            Err(ConfigError::Missing {
                key: keys::ENTERPRISE_AUTHORITY_ID.to_string()
            })
        );
    }

    #[test]
    fn test_zero_port_and_timeout_rejected() {
        let mut props = base_properties();
        props.insert(keys::REGISTRY_PORT.to_string(), "0".to_string());
        assert!(matches!(
            MediatorConfig::from_properties(&props),
            Err(ConfigError::Invalid { ref key, .. }) if key == keys::REGISTRY_PORT
        ));

        let mut props = base_properties();
        props.insert(keys::REQUEST_TIMEOUT_MS.to_string(), "soon".to_string());
        assert!(matches!(
            MediatorConfig::from_properties(&props),
            Err(ConfigError::Invalid { ref key, .. }) if key == keys::REQUEST_TIMEOUT_MS
        ));
    }

    #[test]
    fn test_path_and_scheme_normalised() {
        let mut props = base_properties();
        props.insert(keys::REGISTRY_PATH.to_string(), "axis2/services/xdsregistryb".to_string());
        props.insert(keys::REGISTRY_SCHEME.to_string(), "HTTPS".to_string());
        let config = MediatorConfig::from_properties(&props).unwrap();
        assert_eq!(config.registry.path, "/axis2/services/xdsregistryb");
        assert_eq!(config.registry.scheme, "https");

        props.insert(keys::REGISTRY_SCHEME.to_string(), "ftp".to_string());
        assert!(MediatorConfig::from_properties(&props).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut props = base_properties();
        let env: HashMap<String, String> = HashMap::from([
            ("XDS_REGISTRY_PORT".to_string(), "8010".to_string()),
            ("MEDIATOR_REQUEST_TIMEOUTMS".to_string(), "250".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);

        apply_env_overrides(&mut props, |name| env.get(name).cloned());
        let config = MediatorConfig::from_properties(&props).unwrap();

        assert_eq!(config.registry.port, 8010);
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert!(!props.contains_key("UNRELATED"));
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("xds.registry.port"), "XDS_REGISTRY_PORT");
        assert_eq!(
            env_var_name("pix.requestedAssigningAuthorityId"),
            "PIX_REQUESTEDASSIGNINGAUTHORITYID"
        );
    }

    proptest! {
        /// Any port that is not a decimal u16 is rejected at construction
        #[test]
        fn non_numeric_port_rejected(port in "[a-zA-Z_.-][a-zA-Z0-9_.-]{0,10}") {
            let mut props = base_properties();
            props.insert(keys::REGISTRY_PORT.to_string(), port);

            let is_invalid_port = matches!(
                MediatorConfig::from_properties(&props),
                Err(ConfigError::Invalid { ref key, .. }) if key == keys::REGISTRY_PORT
            );
            prop_assert!(is_invalid_port);
        }

        /// Out-of-range ports are rejected too
        #[test]
        fn out_of_range_port_rejected(port in 65_536u64..10_000_000u64) {
            let mut props = base_properties();
            props.insert(keys::REGISTRY_PORT.to_string(), port.to_string());
            prop_assert!(MediatorConfig::from_properties(&props).is_err());
        }
    }
}
