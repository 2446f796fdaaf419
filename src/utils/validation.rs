/// Characters that are not allowed in file names on common filesystems.
pub const RESERVED_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Strips reserved characters from a human-readable title so it can be used
/// as a file name and object key segment.
///
/// Everything else is kept as-is: no trimming, truncation or Unicode
/// normalization. Distinct titles may therefore map to the same name.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| !RESERVED_FILENAME_CHARS.contains(c))
        .collect()
}

/// True when the string is empty or whitespace only.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
