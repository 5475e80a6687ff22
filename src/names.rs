use indexmap::IndexMap;

use crate::config::SourceEntry;
use crate::model::SourceId;

/// Lookup from source id to the friendly name shown in reports.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceNames {
    names: IndexMap<SourceId, String>,
}

impl SourceNames {
    /// Empty table; every lookup falls back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `display_name` for `id`, replacing any earlier name.
    pub fn with(mut self, id: impl Into<SourceId>, display_name: impl Into<String>) -> Self {
        self.names.insert(id.into(), display_name.into());
        self
    }

    /// Table built from configured sources, keeping their order.
    pub fn from_entries(entries: &[SourceEntry]) -> Self {
        let names = entries
            .iter()
            .map(|entry| (entry.id.clone(), entry.display_name.clone()))
            .collect();
        Self { names }
    }

    /// Friendly name for `id`, or `fallback` when the id is not registered.
    pub fn display_name(&self, id: &str, fallback: &str) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Registered name of `id`, without fallback.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }
}
