//! Fuzzy matching for "did you mean" suggestions.

use strsim::jaro_winkler;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Minimum similarity threshold for suggestions (0.0 to 1.0).
const MIN_SIMILARITY: f64 = 0.8;

/// Maximum number of suggestions to show.
const MAX_SUGGESTIONS: usize = 3;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Find candidates similar to `query`, best match first.
pub fn find_similar(query: &str, candidates: &[String]) -> Vec<String> {
    let query = query.to_lowercase();
    let mut scored: Vec<(&String, f64)> = candidates
        .iter()
        .map(|c| (c, jaro_winkler(&query, &c.to_lowercase())))
        .filter(|(_, score)| *score >= MIN_SIMILARITY)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(c, _)| c.clone())
        .collect()
}

/// Format suggestions in cargo-style. Returns `None` if there are none.
pub fn format_suggestions(suggestions: &[String]) -> Option<String> {
    match suggestions.len() {
        0 => None,
        1 => Some(format!("Did you mean `{}`?", suggestions[0])),
        _ => {
            let formatted: Vec<String> = suggestions.iter().map(|s| format!("`{}`", s)).collect();
            Some(format!("Did you mean one of: {}?", formatted.join(", ")))
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
