//! Best-effort source positions for manifest fields.
//!
//! This is a textual search, not a parser: it reports the first line that
//! contains the quoted key, so a key that appears more than once (or a
//! minified document) can be mis-located.

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Find the first `"key"` occurrence in `text` as a 1-based `(line, column)`.
pub fn locate_key(text: &str, key: &str) -> Option<(usize, usize)> {
    let needle = format!("\"{}\"", key);
    text.lines().enumerate().find_map(|(i, line)| {
        line.find(&needle)
            .map(|byte| (i + 1, line[..byte].chars().count() + 1))
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
