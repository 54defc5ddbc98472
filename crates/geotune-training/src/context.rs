//! Cluster/session metadata read from the notebook server environment.

use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable carrying the notebook server arguments.
pub const NOTEBOOK_ARGS_VAR: &str = "NOTEBOOK_ARGS";

const TORNADO_SETTINGS_FLAG: &str = "--ServerApp.tornado_settings=";
const DASHBOARD_HOST_SEGMENT: &str = "rhods-dashboard-redhat-ods-applications";
const OAUTH_HOST_SEGMENT: &str = "oauth-openshift";
const TOKEN_REQUEST_PATH: &str = "/oauth/token/request";
const PROJECTS_PREFIX: &str = "/projects/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterContext {
    /// OAuth token request URL for `oc login`.
    pub login_url: String,
    /// Kubernetes namespace jobs are submitted into.
    pub namespace: String,
    /// Shared volume root mounted into the session.
    pub shared_root: PathBuf,
}

impl ClusterContext {
    /// Read the context from `NOTEBOOK_ARGS`.
    pub fn from_env(shared_root: PathBuf) -> TrainingResult<Self> {
        let raw = std::env::var(NOTEBOOK_ARGS_VAR).map_err(|_| {
            TrainingError::Context(format!("environment variable {NOTEBOOK_ARGS_VAR} is not set"))
        })?;
        Self::from_notebook_args(&raw, shared_root)
    }

    /// Parse the tornado settings JSON embedded in the notebook arguments.
    pub fn from_notebook_args(raw: &str, shared_root: PathBuf) -> TrainingResult<Self> {
        let settings_json = raw.rsplit(TORNADO_SETTINGS_FLAG).next().unwrap_or(raw);
        let settings: serde_json::Value = serde_json::from_str(settings_json.trim())
            .map_err(|e| TrainingError::Context(format!("tornado settings are not valid JSON: {e}")))?;

        let hub_host = string_field(&settings, "hub_host")?;
        let hub_prefix = string_field(&settings, "hub_prefix")?;

        Ok(Self {
            login_url: login_url_for_host(hub_host),
            namespace: hub_prefix.replace(PROJECTS_PREFIX, ""),
            shared_root,
        })
    }
}

fn string_field<'a>(settings: &'a serde_json::Value, key: &str) -> TrainingResult<&'a str> {
    settings
        .get(key)
        .ok_or_else(|| TrainingError::Context(format!("tornado settings missing `{key}`")))?
        .as_str()
        .ok_or_else(|| TrainingError::Context(format!("tornado setting `{key}` is not a string")))
}

fn login_url_for_host(hub_host: &str) -> String {
    format!("{}{TOKEN_REQUEST_PATH}", hub_host.replace(DASHBOARD_HOST_SEGMENT, OAUTH_HOST_SEGMENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(settings: &str) -> String {
        format!("--ServerApp.port=8888 --ServerApp.tornado_settings={settings}")
    }

    #[test]
    fn test_login_url_and_namespace() {
        let raw = args(
            r#"{"hub_host":"https://rhods-dashboard-redhat-ods-applications.apps.example.com","hub_prefix":"/projects/geo-team"}"#,
        );
        let ctx = ClusterContext::from_notebook_args(&raw, PathBuf::from("/data/")).unwrap();

        assert_eq!(ctx.login_url, "https://oauth-openshift.apps.example.com/oauth/token/request");
        assert_eq!(ctx.namespace, "geo-team");
        assert_eq!(ctx.shared_root, PathBuf::from("/data/"));
    }

    #[test]
    fn test_bare_json_without_flag() {
        let ctx = ClusterContext::from_notebook_args(
            r#"{"hub_host":"https://hub.local","hub_prefix":"/projects/ns"}"#,
            PathBuf::from("/data/"),
        )
        .unwrap();
        assert_eq!(ctx.login_url, "https://hub.local/oauth/token/request");
        assert_eq!(ctx.namespace, "ns");
    }

    #[test]
    fn test_invalid_json_fails() {
        let result = ClusterContext::from_notebook_args(&args("{not json"), PathBuf::from("/data/"));
        assert!(matches!(result, Err(TrainingError::Context(_))));
    }

    #[test]
    fn test_missing_key_fails() {
        let result = ClusterContext::from_notebook_args(&args(r#"{"hub_host":"h"}"#), PathBuf::from("/data/"));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("hub_prefix"));
    }

    #[test]
    fn test_non_string_key_fails() {
        let result = ClusterContext::from_notebook_args(
            &args(r#"{"hub_host":"h","hub_prefix":7}"#),
            PathBuf::from("/data/"),
        );
        assert!(result.is_err());
    }
}
