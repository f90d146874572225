//! Collection names for the Hoist state store.
//!
//! Each collection is a redb table with `&str` keys and `&[u8]` values
//! (JSON-serialized domain types). Secret collections are created per
//! deployment, see [`hoist_core::secret::collection_name`].

use redb::TableDefinition;

/// Deployment configs keyed by name.
pub const DEPLOYMENTS: &str = "deployments";

/// Completed job summaries keyed by completion time.
pub const ACTIVITY: &str = "activity";

/// Table definition for a collection name.
pub(crate) fn table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}
