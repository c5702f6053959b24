use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::remote::SourceDescriptor;
use crate::storage::storage_trait::SourceDirectory;

/// Source directory backed by a fixed table, typically the `[[sources]]`
/// entries of the configuration file.
#[derive(Debug, Default)]
pub struct StaticSourceDirectory {
    sources: RwLock<BTreeMap<String, SourceDescriptor>>,
}

impl StaticSourceDirectory {
    pub fn new(sources: impl IntoIterator<Item = SourceDescriptor>) -> Self {
        Self {
            sources: RwLock::new(sources.into_iter().map(|s| (s.id.clone(), s)).collect()),
        }
    }

    /// Adds or replaces an entry.
    pub fn upsert(&self, source: SourceDescriptor) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.id.clone(), source);
    }
}

impl SourceDirectory for StaticSourceDirectory {
    fn lookup(&self, source_id: &str) -> Option<SourceDescriptor> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_id)
            .cloned()
    }

    fn source_ids(&self) -> Vec<String> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Credentials, Endpoint};

    #[test]
    fn lookup_and_upsert() {
        let dir = StaticSourceDirectory::new(vec![SourceDescriptor::new(
            "b",
            Endpoint::new("h", 22),
            None,
        )]);
        dir.upsert(SourceDescriptor::new(
            "a",
            Endpoint::new("h", 22),
            Some(Credentials::new("u", "p")),
        ));
        assert_eq!(dir.source_ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(dir.lookup("a").unwrap().credentials.is_some());
        assert!(dir.lookup("c").is_none());
    }
}
