//! Masking of token material for logs.

/// Number of leading characters kept visible.
pub const VISIBLE_PREFIX: usize = 8;

/// Masks an identifier for logging: first [`VISIBLE_PREFIX`] characters
/// followed by an ellipsis.
///
/// Identifiers no longer than the prefix are fully hidden so short values
/// are never logged verbatim.
pub fn mask_identifier(identifier: &str) -> String {
    if identifier.chars().count() <= VISIBLE_PREFIX {
        return "***".to_string();
    }

    let prefix: String = identifier.chars().take(VISIBLE_PREFIX).collect();
    format!("{prefix}...")
}
