//! Entity table built from the internal DTD subset.
//!
//! Only internal general entities (`<!ENTITY name "value">`) are
//! recorded. External identifiers, parameter entities, and notation
//! declarations are outside the recognized subset and are skipped by
//! the DOCTYPE scan.

use std::collections::HashMap;

use log::debug;

/// Mapping from entity name to replacement text.
#[derive(Debug, Default)]
pub struct EntityTable {
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

impl EntityTable {
    pub fn new() -> Self {
        EntityTable {
            entries: HashMap::new(),
        }
    }

    /// Record a declaration. The first declaration of a name wins.
    pub fn declare(&mut self, name: &[u8], value: &[u8]) {
        if !self.entries.contains_key(name) {
            debug!(
                "DTD entity '{}' declared ({} bytes)",
                String::from_utf8_lossy(name),
                value.len()
            );
            self.entries.insert(name.to_vec(), value.to_vec());
        }
    }

    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.entries.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
