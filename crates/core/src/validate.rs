/// Upper bound, in characters, for any text sent to the embedding provider.
pub const MAX_CONTENT_CHARS: usize = 8192;

/// A chunk is storable when it has between 1 and [`MAX_CONTENT_CHARS`] characters once trimmed.
pub fn is_valid_content(content: &str) -> bool {
    let length = content.trim().chars().count();
    length > 0 && length <= MAX_CONTENT_CHARS
}
