//! Session configuration from TOML
//!
//! ```toml
//! fetch_timeout_ms = 5000
//! submit_timeout_ms = 5000
//! expand_on_load = true
//!
//! [limits]
//! max_nodes = 2000
//! max_depth = 8
//! ```

use anyhow::Context;
use permtree_core::SessionConfig;
use std::path::Path;

/// Load config from `path`, or defaults when no path is given
///
/// # Errors
/// Fails if the file cannot be read or is not valid TOML for the config.
pub async fn load_config(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("parsing config {}", path.display()))
}

/// Parse config from TOML text
///
/// # Errors
/// Fails on invalid TOML or unknown value types.
pub fn parse_config(raw: &str) -> anyhow::Result<SessionConfig> {
    Ok(toml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config("fetch_timeout_ms = 250\n[limits]\nmax_depth = 3\n").unwrap();
        assert_eq!(config.fetch_timeout_ms, Some(250));
        assert_eq!(config.limits.max_depth, Some(3));
        assert_eq!(config.limits.max_nodes, None);
        assert!(config.expand_on_load);
    }

    #[tokio::test]
    async fn missing_path_is_default() {
        assert_eq!(load_config(None).await.unwrap(), SessionConfig::default());
    }

    #[tokio::test]
    async fn unreadable_file_names_path() {
        let err = load_config(Some(Path::new("/nonexistent/permtree.toml")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/permtree.toml"));
    }

    #[test]
    fn bad_types_are_rejected() {
        assert!(parse_config("expand_on_load = \"yes\"").is_err());
    }
}
