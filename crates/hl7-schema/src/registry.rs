//! Thread-safe cache of loaded structure definitions

use dashmap::DashMap;
use hl7_model::GroupDefinition;
use std::sync::Arc;

/// Registry of message structure definitions keyed by structure name
#[derive(Debug)]
pub struct DefinitionRegistry {
    definitions: DashMap<String, Arc<GroupDefinition>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self {
            definitions: DashMap::new(),
        }
    }

    /// Register a definition, replacing any previous one under the same name
    pub fn register(&self, name: impl Into<String>, definition: Arc<GroupDefinition>) {
        self.definitions.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<Arc<GroupDefinition>> {
        self.definitions
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn clear(&self) {
        self.definitions.clear();
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_model::SegmentDefinition;
    use std::thread;

    fn definition(name: &str) -> Arc<GroupDefinition> {
        Arc::new(GroupDefinition::new(name).with_segment(SegmentDefinition::new("MSH"), true, false))
    }

    #[test]
    fn test_register_and_get() {
        let registry = DefinitionRegistry::new();
        assert!(registry.is_empty());

        registry.register("ADT_A01", definition("ADT_A01"));
        assert!(registry.contains("ADT_A01"));
        assert!(!registry.contains("ORU_R01"));
        assert_eq!(registry.get("ADT_A01").map(|d| d.name.clone()).as_deref(), Some("ADT_A01"));
        assert!(registry.get("ORU_R01").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let registry = DefinitionRegistry::default();
        registry.register("X", definition("FIRST"));
        registry.register("X", definition("SECOND"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("X").unwrap().name, "SECOND");

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_shared_between_threads() {
        let registry = Arc::new(DefinitionRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.register(format!("MSG_{i}"), definition("MSG")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 4);
    }
}
