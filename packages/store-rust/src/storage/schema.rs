//! Collection catalogue applied to a storage engine when it is opened.

use haven_core::{Collection, KeyKind};

/// Schema version of the current collection layout.
///
/// Bump when a collection or index is added; engines create whatever is
/// missing when they see a higher version.
pub const SCHEMA_VERSION: u32 = 1;

/// One collection as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDef {
    pub name: &'static str,
    /// Whether the collection owns an id sequence.
    pub auto_id: bool,
    pub indexes: Vec<&'static str>,
}

impl CollectionDef {
    #[must_use]
    pub fn has_index(&self, index: &str) -> bool {
        self.indexes.iter().any(|name| *name == index)
    }
}

/// Versioned set of collections and their indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub version: u32,
    pub collections: Vec<CollectionDef>,
}

impl Schema {
    /// The layout every [`RecordStore`](crate::RecordStore) opens with.
    #[must_use]
    pub fn current() -> Self {
        let collections = Collection::ALL
            .into_iter()
            .map(|collection| CollectionDef {
                name: collection.name(),
                auto_id: collection.key_kind() == KeyKind::AutoId,
                indexes: collection.indexes().to_vec(),
            })
            .collect();
        Self {
            version: SCHEMA_VERSION,
            collections,
        }
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionDef> {
        self.collections.iter().find(|c| c.name == name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::current()
    }
}
