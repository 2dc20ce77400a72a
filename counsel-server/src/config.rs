//! Server configuration from environment variables.

use std::collections::HashSet;

use counsel_types::ConfigError;
use tracing::warn;

/// Tools that can never be disabled.
pub(crate) const ESSENTIAL_TOOLS: &[&str] = &["version", "listmodels"];

/// Meta tools whose removal would strand the two-stage flow.
pub(crate) const META_TOOLS: &[&str] = &["select_mode", "execute_mode"];

/// Environment-derived server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `DEFAULT_MODEL`: `"auto"` or a concrete model id.
    pub default_model: String,
    /// `DISABLED_TOOLS`: names hidden from the catalogue.
    pub disabled_tools: HashSet<String>,
    /// `LOG_LEVEL`: tracing filter directive.
    pub log_level: String,
    /// `MCP_HOST` for the HTTP shell.
    pub mcp_host: String,
    /// `MCP_PORT` for the HTTP shell.
    pub mcp_port: u16,
    /// `MCP_AUTH_TOKEN` for the HTTP shell's bearer filter.
    pub mcp_auth_token: Option<String>,
    /// `MCP_REQUIRE_AUTH` for the HTTP shell.
    pub mcp_require_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_model: "auto".into(),
            disabled_tools: HashSet::new(),
            log_level: "info".into(),
            mcp_host: "127.0.0.1".into(),
            mcp_port: 8080,
            mcp_auth_token: None,
            mcp_require_auth: false,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(model) = std::env::var("DEFAULT_MODEL") {
            if !model.trim().is_empty() {
                config.default_model = model.trim().to_string();
            }
        }
        if let Ok(raw) = std::env::var("DISABLED_TOOLS") {
            config.disabled_tools = parse_disabled_tools(&raw);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            if !level.trim().is_empty() {
                config.log_level = level.trim().to_ascii_lowercase();
            }
        }
        if let Ok(host) = std::env::var("MCP_HOST") {
            if !host.trim().is_empty() {
                config.mcp_host = host.trim().to_string();
            }
        }
        if let Ok(port) = std::env::var("MCP_PORT") {
            config.mcp_port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "MCP_PORT".into(),
                reason: format!("'{port}' is not a port number"),
            })?;
        }
        config.mcp_auth_token = std::env::var("MCP_AUTH_TOKEN").ok().filter(|t| !t.is_empty());
        if let Ok(required) = std::env::var("MCP_REQUIRE_AUTH") {
            config.mcp_require_auth = matches!(
                required.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
        Ok(config)
    }
}

/// Parse `DISABLED_TOOLS`, dropping essential and meta tools from the
/// request with a warning rather than honouring it.
pub(crate) fn parse_disabled_tools(raw: &str) -> HashSet<String> {
    let mut disabled = HashSet::new();
    for name in raw.split(',') {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        if ESSENTIAL_TOOLS.contains(&name.as_str()) {
            warn!(tool = name, "essential tool cannot be disabled; ignoring");
            continue;
        }
        if META_TOOLS.contains(&name.as_str()) {
            warn!(tool = name, "meta tool cannot be disabled; ignoring");
            continue;
        }
        disabled.insert(name);
    }
    disabled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_tools_parse_and_protect_essentials() {
        let disabled = parse_disabled_tools("debug, version,listmodels , tracer,,select_mode");
        assert!(disabled.contains("debug"));
        assert!(disabled.contains("tracer"));
        assert!(!disabled.contains("version"));
        assert!(!disabled.contains("listmodels"));
        assert!(!disabled.contains("select_mode"));
        assert_eq!(disabled.len(), 2);
    }

    #[test]
    fn default_config_is_auto_mode() {
        let config = ServerConfig::default();
        assert_eq!(config.default_model, "auto");
        assert!(config.disabled_tools.is_empty());
        assert!(!config.mcp_require_auth);
    }
}
