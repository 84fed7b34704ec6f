//! Typed access to the per-profile `Setting` entity (string name → string value, parsed on
//! read). The enumerated key set and default values are fixed by the pipeline contract; any
//! other key is legal to store but has no typed accessor here.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::warn;

/// Collaborator boundary: the relational store backing `Setting` rows. In production this
/// would be a scoped read/write handle into the out-of-scope relational database; here it is
/// implemented in-memory so the pipeline and its tests have a concrete backing.
pub trait SettingsStore: Send + Sync {
    fn get_raw(&self, name: &str) -> Option<String>;
    fn set_raw(&self, name: &str, value: &str);
}

#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn get_raw(&self, name: &str) -> Option<String> {
        self.values.read().expect("settings lock poisoned").get(name).cloned()
    }

    fn set_raw(&self, name: &str, value: &str) {
        self.values
            .write()
            .expect("settings lock poisoned")
            .insert(name.to_string(), value.to_string());
    }
}

/// Typed facade over a [`SettingsStore`]. Every accessor falls back to the documented default
/// on a missing key or a parse failure, logging a `warn!` in the latter case so a malformed
/// setting is visible without failing the turn that reads it.
pub struct Settings<'a> {
    store: &'a dyn SettingsStore,
}

impl<'a> Settings<'a> {
    pub fn new(store: &'a dyn SettingsStore) -> Self {
        Self { store }
    }

    fn get_string(&self, name: &str, default: &str) -> String {
        self.store.get_raw(name).unwrap_or_else(|| default.to_string())
    }

    fn get_int(&self, name: &str, default: i64) -> i64 {
        match self.store.get_raw(name) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(setting = name, value = %raw, "failed to parse int setting, using default");
                default
            }),
            None => default,
        }
    }

    fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.store.get_raw(name) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    warn!(setting = name, value = %raw, "failed to parse bool setting, using default");
                    default
                }
            },
            None => default,
        }
    }

    pub fn llm_provider(&self) -> String {
        self.get_string("LLMProvider", "Gemini")
    }

    pub fn previous_turns_count(&self) -> i64 {
        self.get_int("PreviousTurnsCount", 6)
    }

    pub fn max_dialogue_log_turns(&self) -> i64 {
        self.get_int("MaxDialogueLogTurns", 50)
    }

    pub fn perception_enabled(&self) -> bool {
        self.get_bool("PerceptionEnabled", true)
    }

    pub fn semantic_use_llm_query_transformation(&self) -> bool {
        self.get_bool("SemanticUseLLMQueryTransformation", true)
    }

    /// `type_name` is one of `"Quote"`, `"Memory"`, `"Insight"`, `"PersonaVoiceSample"`.
    pub fn semantic_token_quota(&self, type_name: &str) -> i64 {
        let default = match type_name {
            "Quote" => 3000,
            "Memory" => 4500,
            "Insight" => 2250,
            "PersonaVoiceSample" => 2250,
            _ => 0,
        };
        self.get_int(&format!("SemanticTokenQuota_{type_name}"), default)
    }

    pub fn trigger_scan_text_additional_words(&self) -> String {
        self.get_string("TriggerScanTextAdditionalWords", "")
    }

    pub fn claude_model(&self) -> String {
        self.get_string("ClaudeModel", "claude-sonnet-4-5")
    }

    pub fn technical_model(&self) -> String {
        self.get_string("TechnicalModel", "gemini-2.0-flash")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_documented_defaults() {
        let store = InMemorySettingsStore::new();
        let settings = Settings::new(&store);
        assert_eq!(settings.previous_turns_count(), 6);
        assert_eq!(settings.max_dialogue_log_turns(), 50);
        assert!(settings.semantic_use_llm_query_transformation());
        assert_eq!(settings.semantic_token_quota("Quote"), 3000);
        assert_eq!(settings.semantic_token_quota("Memory"), 4500);
    }

    #[test]
    fn stored_values_override_defaults() {
        let store = InMemorySettingsStore::new();
        store.set_raw("PreviousTurnsCount", "0");
        store.set_raw("LLMProvider", "Claude");
        let settings = Settings::new(&store);
        assert_eq!(settings.previous_turns_count(), 0);
        assert_eq!(settings.llm_provider(), "Claude");
    }

    #[test]
    fn unparseable_int_falls_back_to_default() {
        let store = InMemorySettingsStore::new();
        store.set_raw("PreviousTurnsCount", "not-a-number");
        let settings = Settings::new(&store);
        assert_eq!(settings.previous_turns_count(), 6);
    }

    #[test]
    fn bool_accepts_common_spellings() {
        let store = InMemorySettingsStore::new();
        store.set_raw("PerceptionEnabled", "0");
        let settings = Settings::new(&store);
        assert!(!settings.perception_enabled());
    }
}
