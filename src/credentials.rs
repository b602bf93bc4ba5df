//! API credentials scoped to one run.
//!
//! Built once at startup (from the environment, after `.env` is loaded) or
//! directly from pairs in tests, then handed to whichever engine needs it.

use crate::{
    config::CredentialEnv,
    engine::EngineKind,
    error::{Error, Result},
};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Default)]
pub struct Credentials {
    keys: BTreeMap<EngineKind, String>,
}

impl Credentials {
    pub fn from_env(names: &CredentialEnv) -> Self {
        let lookup = [
            (EngineKind::OpenAi, names.openai_env.as_str()),
            (EngineKind::Gemini, names.gemini_env.as_str()),
            (EngineKind::Claude, names.claude_env.as_str()),
        ];
        let keys = lookup
            .into_iter()
            .filter_map(|(kind, var)| {
                std::env::var(var)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (kind, v))
            })
            .collect();
        Self { keys }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (EngineKind, S)>,
        S: Into<String>,
    {
        Self {
            keys: pairs.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }

    pub fn get(&self, kind: EngineKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }

    /// Key for the selected engine. `Default` needs none; any other engine
    /// without a key is a configuration error.
    pub fn require(&self, kind: EngineKind) -> Result<Option<&str>> {
        if kind == EngineKind::Default {
            return Ok(None);
        }
        self.get(kind).map(Some).ok_or_else(|| {
            Error::Configuration(format!("no API key configured for engine {kind}"))
        })
    }

    pub fn available(&self) -> Vec<EngineKind> {
        self.keys.keys().copied().collect()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("engines", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_needs_no_key() {
        let creds = Credentials::default();
        assert_eq!(creds.require(EngineKind::Default).unwrap(), None);
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let creds = Credentials::from_pairs([(EngineKind::OpenAi, "sk-test")]);
        assert_eq!(creds.require(EngineKind::OpenAi).unwrap(), Some("sk-test"));
        assert!(matches!(
            creds.require(EngineKind::Claude),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn debug_hides_keys() {
        let creds = Credentials::from_pairs([(EngineKind::Gemini, "secret-value")]);
        assert!(!format!("{creds:?}").contains("secret-value"));
    }
}
