/// Metadata store boundary
///
/// Field-key definitions live outside the compiler, in attribute-metadata
/// tables maintained by the ingestion path. The compiler only sees
/// `Registry` snapshots; callers assemble those snapshots through this
/// trait before compiling.
use crate::types::{FieldKeySelector, Registry};

/// Source of field-key definitions.
///
/// Implementations must be safe for concurrent read-only use; many
/// compile calls query the store in parallel.
pub trait MetadataStore: Send + Sync {
    /// All physical keys matching one selector, grouped by logical name.
    fn get_keys(&self, selector: &FieldKeySelector) -> Registry;

    /// Merged keys for a batch of selectors, deduplicated by the
    /// (name, context, type) key identity.
    fn get_keys_multi(&self, selectors: &[FieldKeySelector]) -> Registry {
        let mut merged = Registry::new();
        for selector in selectors {
            for (name, keys) in self.get_keys(selector) {
                let entry = merged.entry(name).or_default();
                for key in keys {
                    let seen = entry.iter().any(|existing| {
                        existing.name == key.name
                            && existing.field_context == key.field_context
                            && existing.field_data_type == key.field_data_type
                    });
                    if !seen {
                        entry.push(key);
                    }
                }
            }
        }
        merged
    }
}

/// An already-assembled registry snapshot is itself a store; tests and
/// single-tenant deployments use this directly.
impl MetadataStore for Registry {
    fn get_keys(&self, selector: &FieldKeySelector) -> Registry {
        let mut out = Registry::new();
        if let Some(keys) = self.get(&selector.name) {
            let matched: Vec<_> = keys
                .iter()
                .filter(|key| selector.matches(key))
                .cloned()
                .collect();
            if !matched.is_empty() {
                out.insert(selector.name.clone(), matched);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldContext, FieldDataType, Signal, TelemetryFieldKey};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.insert(
            "service.name".to_string(),
            vec![TelemetryFieldKey::new(
                "service.name",
                Signal::Traces,
                FieldContext::Resource,
                FieldDataType::String,
            )],
        );
        registry.insert(
            "http.status_code".to_string(),
            vec![
                TelemetryFieldKey::new(
                    "http.status_code",
                    Signal::Traces,
                    FieldContext::Attribute,
                    FieldDataType::Number,
                ),
                TelemetryFieldKey::new(
                    "http.status_code",
                    Signal::Traces,
                    FieldContext::Attribute,
                    FieldDataType::String,
                ),
            ],
        );
        registry
    }

    #[test]
    fn test_get_keys_filters_by_selector() {
        let store = registry();
        let selector = FieldKeySelector::from_text("http.status_code:string");
        let keys = store.get_keys(&selector);
        assert_eq!(keys["http.status_code"].len(), 1);
        assert_eq!(
            keys["http.status_code"][0].field_data_type,
            FieldDataType::String
        );
    }

    #[test]
    fn test_get_keys_unknown_name_is_empty() {
        let store = registry();
        let selector = FieldKeySelector::from_text("no.such.key");
        assert!(store.get_keys(&selector).is_empty());
    }

    #[test]
    fn test_get_keys_multi_dedups_by_identity() {
        let store = registry();
        let selectors = vec![
            FieldKeySelector::from_text("service.name"),
            // overlaps the first selector; the merged result must not
            // carry the key twice
            FieldKeySelector::from_text("resource.service.name"),
            FieldKeySelector::from_text("http.status_code"),
        ];
        let merged = store.get_keys_multi(&selectors);
        assert_eq!(merged["service.name"].len(), 1);
        assert_eq!(merged["http.status_code"].len(), 2);
    }
}
