//! ID generation for engine records
//!
//! All IDs use the format: `{kind}-{12-char-hex}`
//! Example: `exec-01943f2a8b1c`

/// Generate a record ID for the given kind (task, exec, queued, item)
pub fn generate_id(kind: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex: String = uuid.simple().to_string().chars().take(12).collect();
    format!("{}-{}", kind, hex)
}
