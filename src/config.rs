//! runtime knobs for the help desk. seeded from env at startup, then fixed
//! for the life of the app.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::department::SYSTEM_PROMPT;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_SECRET_NAME: &str = "OPENAI_API_KEY";

/// what happens when the completion call fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// show the error inline, drop the turn, keep the session going.
    #[default]
    Report,
    /// leave the fault unrecovered: the app exits with an error.
    Propagate,
}

impl FailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "report" => Some(Self::Report),
            "propagate" => Some(Self::Propagate),
            _ => None,
        }
    }
}

#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HelpDeskConfig {
    pub model: String,
    pub temperature: f32,
    /// openai-compatible base, with or without the trailing `/v1`.
    pub base_url: String,
    /// key looked up in the secret store.
    pub secret_name: String,
    pub system_prompt: String,
    pub failure_policy: FailurePolicy,
}

impl Default for HelpDeskConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            failure_policy: FailurePolicy::Report,
        }
    }
}

impl HelpDeskConfig {
    /// defaults overridden by `LLM_BASE_URL`, `LLM_MODEL`,
    /// `HELPDESK_SECRET_NAME` and `HELPDESK_FAILURE_POLICY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("LLM_BASE_URL") {
            cfg.base_url = v;
        }
        if let Some(v) = non_empty("LLM_MODEL") {
            cfg.model = v;
        }
        if let Some(v) = non_empty("HELPDESK_SECRET_NAME") {
            cfg.secret_name = v;
        }
        if let Some(v) = non_empty("HELPDESK_FAILURE_POLICY") {
            match FailurePolicy::parse(&v) {
                Some(p) => cfg.failure_policy = p,
                None => warn!(target: "bevy_helpdesk", "ignoring unknown failure policy '{}'", v),
            }
        }
        cfg
    }

    /// base url as handed to the provider builder.
    pub fn provider_base_url(&self) -> String {
        responses_url(&self.base_url)
    }
}

// provider requires base to include `/v1` (avoids 404s on chat endpoints).
pub fn normalize_oai_base(base: &str) -> String {
    let b = base.trim().trim_end_matches('/');
    if b.ends_with("/v1") {
        b.to_string()
    } else {
        format!("{}/v1", b)
    }
}

fn responses_url(base: &str) -> String {
    format!("{}/responses", normalize_oai_base(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_fixed_call_parameters() {
        let cfg = HelpDeskConfig::default();
        assert_eq!(cfg.model, "gpt-3.5-turbo");
        assert_eq!(cfg.temperature, 0.7);
        assert_eq!(cfg.secret_name, "OPENAI_API_KEY");
        assert_eq!(cfg.failure_policy, FailurePolicy::Report);
        assert_eq!(cfg.system_prompt, SYSTEM_PROMPT);
    }

    #[test]
    fn lookup_overrides_and_ignores_blanks() {
        let env: HashMap<&str, &str> = [
            ("LLM_MODEL", "gpt-4o-mini"),
            ("LLM_BASE_URL", "  "),
            ("HELPDESK_FAILURE_POLICY", "Propagate"),
        ]
        .into_iter()
        .collect();
        let cfg = HelpDeskConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.failure_policy, FailurePolicy::Propagate);
    }

    #[test]
    fn unknown_policy_keeps_default() {
        let cfg = HelpDeskConfig::from_lookup(|k| {
            (k == "HELPDESK_FAILURE_POLICY").then(|| "retry".to_string())
        });
        assert_eq!(cfg.failure_policy, FailurePolicy::Report);
    }

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_oai_base("https://api.openai.com"), "https://api.openai.com/v1");
        assert_eq!(normalize_oai_base("https://api.openai.com/v1/"), "https://api.openai.com/v1");
        let cfg = HelpDeskConfig {
            base_url: "http://localhost:8080/".into(),
            ..default()
        };
        assert_eq!(cfg.provider_base_url(), "http://localhost:8080/v1/responses");
    }
}
