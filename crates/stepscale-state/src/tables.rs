//! redb table definitions.
//!
//! Keys are `{namespace}/{name}`; values are JSON-serialized records.

use redb::TableDefinition;

/// Scale records keyed by workload.
pub const SCALE_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("scale_records");
