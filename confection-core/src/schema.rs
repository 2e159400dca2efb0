use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the persisted item table. Bump on any structural change;
/// stores holding another version are wiped on open.
pub const SCHEMA_VERSION: u32 = 2;

/// Column set of the item table, in persisted order.
pub const ITEM_COLUMNS: &str = "id:integer primary key autoincrement;\
name:text not null;\
category:text not null;\
price:real not null;\
weight:integer not null;\
description:text;\
status:text not null";

/// A 32-byte Blake3 hash of a table shape description.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hashes a shape description.
    pub fn of(shape: &str) -> Self {
        Fingerprint(*blake3::hash(shape.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&blake3::Hash::from_bytes(self.0).to_hex())
    }
}

/// Identifies the structure a store was written with.
///
/// Stores compare the stamp they find against [`SchemaStamp::current`] and
/// recreate themselves empty on any difference. There are no migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaStamp {
    pub version: u32,
    pub shape: Fingerprint,
}

impl SchemaStamp {
    pub fn new(version: u32, columns: &str) -> Self {
        SchemaStamp {
            version,
            shape: Fingerprint::of(columns),
        }
    }

    pub fn current() -> Self {
        Self::new(SCHEMA_VERSION, ITEM_COLUMNS)
    }
}

impl fmt::Display for SchemaStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} ({})", self.version, self.shape)
    }
}
