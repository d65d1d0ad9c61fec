//! redb table definitions for the Spacehub state store.
//!
//! Record tables use `u64` keys (the record id) and `&[u8]` values holding
//! JSON-serialized domain types. Ids are allocated from [`SEQUENCES`].

use redb::TableDefinition;

/// Spaces keyed by space id.
pub const SPACES: TableDefinition<u64, &[u8]> = TableDefinition::new("spaces");

/// Space apps keyed by app id. At most one row per space.
pub const SPACE_APPS: TableDefinition<u64, &[u8]> = TableDefinition::new("space_apps");

/// Secret metadata keyed by secret id. Plaintext values live in the vault.
pub const SPACE_SECRETS: TableDefinition<u64, &[u8]> = TableDefinition::new("space_secrets");

/// Variables keyed by variable id.
pub const SPACE_VARIABLES: TableDefinition<u64, &[u8]> = TableDefinition::new("space_variables");

/// Last allocated id per record table, keyed by table name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
