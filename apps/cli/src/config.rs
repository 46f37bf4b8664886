use std::{collections::HashMap, fs, path::Path};

use client_core::ReleasePolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub gateway_url: String,
    pub signer_seed: Option<String>,
    pub address: Option<String>,
    pub release_policy: ReleasePolicy,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8006".into(),
            signer_seed: None,
            address: None,
            release_policy: ReleasePolicy::ResetInProcess,
            request_timeout_secs: 60,
        }
    }
}

pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("gateway_url") {
        settings.gateway_url = v.clone();
    }
    if let Some(v) = file_cfg.get("signer_seed") {
        settings.signer_seed = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("address") {
        settings.address = Some(v.clone());
    }
    if let Some(policy) = file_cfg.get("release_policy").and_then(|v| parse_release_policy(v)) {
        settings.release_policy = policy;
    }
    if let Some(secs) = file_cfg
        .get("request_timeout_secs")
        .and_then(|v| v.parse::<u64>().ok())
    {
        settings.request_timeout_secs = secs;
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("GATEWAY_URL") {
        settings.gateway_url = v;
    }
    if let Some(v) = lookup("APP__GATEWAY_URL") {
        settings.gateway_url = v;
    }

    if let Some(v) = lookup("SIGNER_SEED") {
        settings.signer_seed = Some(v);
    }
    if let Some(v) = lookup("APP__SIGNER_SEED") {
        settings.signer_seed = Some(v);
    }

    if let Some(v) = lookup("APP__ADDRESS") {
        settings.address = Some(v);
    }

    if let Some(policy) = lookup("APP__RELEASE_POLICY").and_then(|v| parse_release_policy(&v)) {
        settings.release_policy = policy;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}

pub fn parse_release_policy(raw: &str) -> Option<ReleasePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "reset" | "reset_in_process" => Some(ReleasePolicy::ResetInProcess),
        "restart" | "require_restart" => Some(ReleasePolicy::RequireRestart),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
gateway_url = "https://broker.example/api"
release_policy = "restart"
request_timeout_secs = "15"
"#,
        );
        assert_eq!(settings.gateway_url, "https://broker.example/api");
        assert_eq!(settings.release_policy, ReleasePolicy::RequireRestart);
        assert_eq!(settings.request_timeout_secs, 15);
        assert_eq!(settings.signer_seed, None);
    }

    #[test]
    fn prefixed_env_wins_over_plain_env() {
        let mut settings = Settings::default();
        let env: HashMap<&str, &str> = [
            ("GATEWAY_URL", "http://plain:1"),
            ("APP__GATEWAY_URL", "http://prefixed:2"),
            ("SIGNER_SEED", "c2VlZA=="),
            ("APP__REQUEST_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.gateway_url, "http://prefixed:2");
        assert_eq!(settings.signer_seed.as_deref(), Some("c2VlZA=="));
        assert_eq!(settings.request_timeout_secs, 60);
    }

    #[test]
    fn malformed_file_is_ignored() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "gateway_url = [");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn unknown_release_policy_is_rejected() {
        assert_eq!(parse_release_policy("Reset"), Some(ReleasePolicy::ResetInProcess));
        assert_eq!(parse_release_policy("later"), None);
    }
}
