//! In-process acceptance rules applied to each sampled body.

use randcaps_core::text::{alphabetic_ratio, char_len, has_lowercase};
use randcaps_storage::corpus::HistoricalMessage;

/// Bodies must be strictly longer than this many characters.
pub const MIN_LENGTH_EXCLUSIVE: usize = 10;

pub const MIN_ALPHABETIC_RATIO: f64 = 0.6;

/// Rules run in order and stop at the first failure. The lowercase check
/// repeats the store-side pattern, which only covers ASCII.
pub fn is_eligible(body: &str) -> bool {
    if char_len(body) <= MIN_LENGTH_EXCLUSIVE {
        return false;
    }
    if has_lowercase(body) {
        return false;
    }
    alphabetic_ratio(body) >= MIN_ALPHABETIC_RATIO
}

/// Eligible bodies, duplicates kept so repeated phrases weigh more.
pub fn filter_candidates(messages: &[HistoricalMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|m| m.body.as_str())
        .filter(|body| is_eligible(body))
        .map(ToOwned::to_owned)
        .collect()
}
