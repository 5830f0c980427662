//! ID generation for projects, boards, columns and tasks.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix for project IDs.
pub const PROJECT_PREFIX: &str = "pr";

/// Prefix for board IDs.
pub const BOARD_PREFIX: &str = "bd";

/// Prefix for column IDs.
pub const COLUMN_PREFIX: &str = "co";

/// Prefix for task IDs.
pub const TASK_PREFIX: &str = "tk";

/// Generate a unique ID from content + entropy.
/// Format: prefix + "-" + 10 hex chars of SHA256(name + timestamp + random)
pub fn generate_id(prefix: &str, name: &str, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(created_at.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(rand::rng().random::<[u8; 8]>());
    let hash = hasher.finalize();
    format!(
        "{}-{:010x}",
        prefix,
        u64::from_be_bytes([hash[0], hash[1], hash[2], hash[3], hash[4], 0, 0, 0]) >> 24
    )
}
