//! api key lookup: secret store first, manual entry second.

use bevy::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{HelpDeskError, Result};

/// an api key. only `expose` hands out the raw value; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// `None` for blank input.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let s = secret.into().trim().to_string();
        (!s.is_empty()).then_some(Self(s))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// where a session's credential came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    Store,
    Manual,
}

/// a key/value collaborator read once per session.
pub trait SecretSource: Send + Sync {
    /// `Ok(None)` when the key is simply not there.
    fn get(&self, name: &str) -> Result<Option<String>>;
}

/// process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(std::env::var(name).ok())
    }
}

/// flat `secrets.toml`: `OPENAI_API_KEY = "sk-..."`.
/// a missing file behaves like an empty store.
#[derive(Clone, Debug)]
pub struct TomlSecrets {
    path: PathBuf,
}

impl TomlSecrets {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SecretSource for TomlSecrets {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let table: HashMap<String, toml::Value> = toml::from_str(&text)?;
        Ok(table.get(name).and_then(|v| v.as_str()).map(str::to_string))
    }
}

/// in-memory store.
#[derive(Clone, Debug, Default)]
pub struct StaticSecrets(pub HashMap<String, String>);

impl StaticSecrets {
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.0.get(name).cloned())
    }
}

/// first source that yields a non-blank value wins.
/// a failing source is logged and skipped.
#[derive(Default)]
pub struct ChainedSecrets(pub Vec<Box<dyn SecretSource>>);

impl ChainedSecrets {
    pub fn then(mut self, source: impl SecretSource + 'static) -> Self {
        self.0.push(Box::new(source));
        self
    }
}

impl SecretSource for ChainedSecrets {
    fn get(&self, name: &str) -> Result<Option<String>> {
        for src in &self.0 {
            match src.get(name) {
                Ok(Some(v)) if !v.trim().is_empty() => return Ok(Some(v)),
                Ok(_) => {}
                Err(err) => warn!(target: "bevy_helpdesk", "secret source failed: {err}"),
            }
        }
        Ok(None)
    }
}

/// the secret store sessions resolve against.
#[derive(Resource)]
pub struct Secrets(pub Box<dyn SecretSource>);

impl Secrets {
    pub fn new(source: impl SecretSource + 'static) -> Self {
        Self(Box::new(source))
    }
}

impl Default for Secrets {
    /// `secrets.toml` in the working directory, then the environment.
    fn default() -> Self {
        Self::new(
            ChainedSecrets::default()
                .then(TomlSecrets::new("secrets.toml"))
                .then(EnvSecrets),
        )
    }
}

/// store first, then manual entry. blank values count as absent.
pub fn resolve_credential(
    source: &dyn SecretSource,
    name: &str,
    manual: Option<&str>,
) -> Result<(Credential, CredentialSource)> {
    match source.get(name) {
        Ok(Some(v)) => {
            if let Some(c) = Credential::new(v) {
                return Ok((c, CredentialSource::Store));
            }
        }
        Ok(None) => {}
        Err(err) => warn!(target: "bevy_helpdesk", "secret store lookup for '{}' failed: {}", name, err),
    }
    manual
        .and_then(Credential::new)
        .map(|c| (c, CredentialSource::Manual))
        .ok_or_else(|| HelpDeskError::MissingCredential { name: name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn store_wins_over_manual() {
        let store = StaticSecrets::default().with("OPENAI_API_KEY", "sk-store");
        let (c, src) = resolve_credential(&store, "OPENAI_API_KEY", Some("sk-manual")).unwrap();
        assert_eq!(c.expose(), "sk-store");
        assert_eq!(src, CredentialSource::Store);
    }

    #[test]
    fn manual_fills_in_for_missing_or_blank_store() {
        let store = StaticSecrets::default().with("OPENAI_API_KEY", "   ");
        let (c, src) = resolve_credential(&store, "OPENAI_API_KEY", Some(" sk-manual ")).unwrap();
        assert_eq!(c.expose(), "sk-manual");
        assert_eq!(src, CredentialSource::Manual);
    }

    #[test]
    fn both_absent_is_missing_credential() {
        let err = resolve_credential(&StaticSecrets::default(), "OPENAI_API_KEY", Some("")).unwrap_err();
        assert_eq!(err, HelpDeskError::MissingCredential { name: "OPENAI_API_KEY".into() });
    }

    #[test]
    fn debug_output_is_redacted() {
        let c = Credential::new("sk-very-secret").unwrap();
        assert!(!format!("{c:?}").contains("sk-very-secret"));
    }

    #[test]
    fn toml_file_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "OPENAI_API_KEY = \"sk-from-file\"\nOTHER = 3").unwrap();

        let store = TomlSecrets::new(&path);
        assert_eq!(store.get("OPENAI_API_KEY").unwrap().as_deref(), Some("sk-from-file"));
        assert_eq!(store.get("OTHER").unwrap(), None);
        assert_eq!(store.get("MISSING").unwrap(), None);
    }

    #[test]
    fn toml_missing_file_is_empty_and_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = TomlSecrets::new(dir.path().join("nope.toml"));
        assert_eq!(missing.get("OPENAI_API_KEY").unwrap(), None);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "OPENAI_API_KEY = ").unwrap();
        assert!(matches!(
            TomlSecrets::new(&bad).get("OPENAI_API_KEY"),
            Err(HelpDeskError::Secrets(_))
        ));
    }

    #[test]
    fn chain_skips_failing_and_blank_sources() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "not = = toml").unwrap();

        let chain = ChainedSecrets::default()
            .then(TomlSecrets::new(&bad))
            .then(StaticSecrets::default().with("K", ""))
            .then(StaticSecrets::default().with("K", "v"));
        assert_eq!(chain.get("K").unwrap().as_deref(), Some("v"));
    }
}
