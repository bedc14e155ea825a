use anyhow::Context;
use mcplink_core::{PoolConfig, ServerEndpoint};
use std::path::Path;
use tracing::info;

/// Name of the server built from the environment when no file exists.
pub const ENV_SERVER_NAME: &str = "default";

/// Load `[servers.<name>]` tables from `path`, or fall back to a single
/// `default` server configured from the `MCP_*` environment variables when
/// the file does not exist.
pub fn load_pool_config(path: &Path) -> anyhow::Result<PoolConfig> {
    load_pool_config_with(path, ServerEndpoint::from_env)
}

pub(crate) fn load_pool_config_with<F>(path: &Path, from_env: F) -> anyhow::Result<PoolConfig>
where
    F: FnOnce() -> mcplink_core::McpLinkResult<ServerEndpoint>,
{
    let config = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: PoolConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        info!(path = %path.display(), servers = config.servers.len(), "Loaded server configuration");
        config
    } else {
        let endpoint = from_env()?;
        info!(url = %endpoint.url, "No config file, using MCP_* environment");
        let mut config = PoolConfig::default();
        config.servers.insert(ENV_SERVER_NAME.to_string(), endpoint);
        config
    };

    if config.servers.is_empty() {
        anyhow::bail!("no servers configured in '{}'", path.display());
    }
    config.validate()?;
    Ok(config)
}

/// Pick the endpoint for `requested`, or the `default` server, or the only
/// server when there is just one.
pub fn select_server<'a>(
    config: &'a PoolConfig,
    requested: Option<&str>,
) -> anyhow::Result<(&'a str, &'a ServerEndpoint)> {
    if let Some(name) = requested {
        return config
            .servers
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .with_context(|| {
                format!(
                    "unknown server '{name}' (configured: {})",
                    config.servers.keys().cloned().collect::<Vec<_>>().join(", ")
                )
            });
    }

    if let Some((name, endpoint)) = config.servers.get_key_value(ENV_SERVER_NAME) {
        return Ok((name.as_str(), endpoint));
    }

    let mut servers = config.servers.iter();
    match (servers.next(), servers.next()) {
        (Some((name, endpoint)), None) => Ok((name.as_str(), endpoint)),
        _ => anyhow::bail!("several servers configured, pick one with --server"),
    }
}
