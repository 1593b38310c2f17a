//! Field registry.
//!
//! Records the encodings with variable fields and batches them by layout, so
//! every distinct field signature maps to exactly one shared decode routine.
//! Entries keep insertion order, which keeps generated output stable.

use std::collections::HashMap;

use super::types::FieldTag;

/// Errors raised while registering field signatures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// Two different field layouts would share one decode routine.
    #[error("field tag '{tag}' for signature '{signature}' already used by signature '{existing}'")]
    TagCollision {
        tag: FieldTag,
        existing: String,
        signature: String,
    },
}

/// One registered field layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    /// Field signature (e.g., "______________jjd___")
    pub signature: String,
    /// Canonical tag (e.g., "jjd")
    pub tag: FieldTag,
    /// Indices of the records using this layout, in registration order
    pub users: Vec<usize>,
}

/// Append-only registry of field signatures.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    entries: Vec<FieldEntry>,
    by_signature: HashMap<String, usize>,
    by_tag: HashMap<FieldTag, usize>,
}

impl FieldRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field signature and return its tag.
    ///
    /// Registering a known signature returns the existing tag without growing
    /// the registry.
    pub fn register(&mut self, signature: &str) -> Result<FieldTag, FieldError> {
        if let Some(&idx) = self.by_signature.get(signature) {
            return Ok(self.entries[idx].tag.clone());
        }

        let tag = FieldTag::from_signature(signature);
        if let Some(&idx) = self.by_tag.get(&tag) {
            return Err(FieldError::TagCollision {
                tag,
                existing: self.entries[idx].signature.clone(),
                signature: signature.to_string(),
            });
        }

        let idx = self.entries.len();
        log::debug!("New field layout '{}' -> {}", signature, tag);
        self.entries.push(FieldEntry {
            signature: signature.to_string(),
            tag: tag.clone(),
            users: Vec::new(),
        });
        self.by_signature.insert(signature.to_string(), idx);
        self.by_tag.insert(tag.clone(), idx);

        Ok(tag)
    }

    /// Note that record `record` uses the layout `signature`.
    ///
    /// Unknown signatures are ignored.
    pub fn add_user(&mut self, signature: &str, record: usize) {
        if let Some(&idx) = self.by_signature.get(signature) {
            self.entries[idx].users.push(record);
        }
    }

    /// Look up the entry for a tag.
    pub fn get(&self, tag: &FieldTag) -> Option<&FieldEntry> {
        self.by_tag.get(tag).map(|&idx| &self.entries[idx])
    }

    /// Registered layouts in insertion order.
    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = FieldRegistry::new();
        let first = registry.register("_x_").unwrap();
        let second = registry.register("_x_").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str(), "x");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tag_collision() {
        let mut registry = FieldRegistry::new();
        registry.register("x_").unwrap();

        let err = registry.register("_x").unwrap_err();
        assert_eq!(
            err,
            FieldError::TagCollision {
                tag: FieldTag::from_signature("x"),
                existing: "x_".to_string(),
                signature: "_x".to_string(),
            }
        );
        // Failed registration leaves the registry untouched
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_no_field_signature() {
        let mut registry = FieldRegistry::new();
        let tag = registry.register("____").unwrap();
        assert!(tag.is_none());

        // A different all-fixed width would also strip to "none"
        assert!(matches!(
            registry.register("______"),
            Err(FieldError::TagCollision { .. })
        ));
    }

    #[test]
    fn test_insertion_order_and_users() {
        let mut registry = FieldRegistry::new();
        registry.register("__ddd").unwrap();
        registry.register("aa___").unwrap();
        registry.register("__ddd").unwrap();
        registry.add_user("__ddd", 0);
        registry.add_user("aa___", 1);
        registry.add_user("__ddd", 2);
        registry.add_user("zz___", 3);

        let tags: Vec<_> = registry.entries().iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["ddd", "aa"]);

        let ddd = registry.get(&FieldTag::from_signature("ddd")).unwrap();
        assert_eq!(ddd.users, vec![0, 2]);
    }
}
