//! Built-in rule catalog

pub mod duplicated_array_key;

pub use duplicated_array_key::DuplicatedArrayKey;

use crate::config::RulesConfig;
use crate::rule::{Rule, RuleSettings};
use log::warn;
use std::sync::Arc;

type RuleFactory = fn(RuleSettings) -> Arc<dyn Rule>;

const BUILTIN: &[(&str, RuleFactory)] = &[(DuplicatedArrayKey::ID, duplicated_array_key)];

fn duplicated_array_key(settings: RuleSettings) -> Arc<dyn Rule> {
    Arc::new(DuplicatedArrayKey::new(settings))
}

/// Ids of every built-in rule
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(id, _)| *id)
}

/// Instantiate the enabled built-in rules with their configured settings
pub fn builtin_rules(config: &RulesConfig) -> Vec<Arc<dyn Rule>> {
    for id in config.disabled.iter().chain(config.settings.keys()) {
        if !builtin_ids().any(|known| known == id.as_str()) {
            warn!("Unknown rule `{}` in configuration", id);
        }
    }

    BUILTIN
        .iter()
        .filter(|(id, _)| config.is_enabled(id))
        .map(|(id, factory)| factory(config.settings.get(*id).cloned().unwrap_or_default()))
        .collect()
}
