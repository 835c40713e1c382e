//! Sharded remote path derivation.
//!
//! Remote-side directories are fanned out by identifier so no single
//! directory accumulates an unbounded number of entries: the identifier
//! minus its last three characters becomes a chain of three-character
//! directory segments, and the full identifier is kept as the leaf, so the
//! path stays unique even though the prefix is lossy.

/// Width of one directory segment in the sharded prefix.
const SEGMENT_WIDTH: usize = 3;

/// Derive the directory prefix for an identifier.
///
/// The last `SEGMENT_WIDTH` characters never contribute to the prefix;
/// what remains is split into `SEGMENT_WIDTH`-character segments joined by
/// `/`, with the final segment allowed to be shorter. Identifiers shorter
/// than four characters produce an empty prefix and are stored at the top
/// level.
pub fn shard_prefix(external_id: &str) -> String {
    let chars: Vec<char> = external_id.chars().collect();
    let prefix_len = chars.len().saturating_sub(SEGMENT_WIDTH);

    let mut prefix = String::with_capacity(prefix_len + prefix_len / SEGMENT_WIDTH);
    for (i, c) in chars[..prefix_len].iter().enumerate() {
        if i > 0 && i % SEGMENT_WIDTH == 0 {
            prefix.push('/');
        }
        prefix.push(*c);
    }
    prefix
}

/// Full remote storage path for an identifier: the sharded prefix with the
/// identifier itself as the leaf.
pub fn remote_path(external_id: &str) -> String {
    let prefix = shard_prefix(external_id);
    if prefix.is_empty() {
        external_id.to_string()
    } else {
        format!("{prefix}/{external_id}")
    }
}
