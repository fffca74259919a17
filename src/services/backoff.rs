//! Classification of provider errors and wait-time selection.
//!
//! The provider signals throttling through unstructured message text rather
//! than a status code the caller gets to see, so the policy degrades
//! gracefully: trust the server's stated wait time when the message parses,
//! fall back to blind exponential backoff when it does not.

use crate::constants::{BACKOFF_BASE_SECS, THROTTLE_PHRASES, WAIT_HINT_BUFFER_SECS};

/// How a failed fetch attempt should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Provider-side throttling; retry after waiting `wait_secs`.
    Throttled { wait_secs: u64 },
    /// Anything else; terminal, never retried.
    Fatal,
}

/// Classify a provider error message.
///
/// Throttling detection is a case-insensitive substring match against
/// [`THROTTLE_PHRASES`]. When the message states its own wait time
/// ("sau 10 giây", "after 10 seconds") that hint plus a safety buffer wins;
/// otherwise the wait is exponential in the zero-based attempt index.
pub fn classify(error_text: &str, attempt: u32) -> Classification {
    let lowered = error_text.to_lowercase();
    if !THROTTLE_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return Classification::Fatal;
    }

    let wait_secs = match extract_wait_secs(&lowered) {
        Some(hint) => hint + WAIT_HINT_BUFFER_SECS,
        None => BACKOFF_BASE_SECS.saturating_mul(2u64.saturating_pow(attempt)),
    };

    Classification::Throttled { wait_secs }
}

/// Pull a wait hint out of an error message: "sau N giây", "after N seconds",
/// or the bare "N giây" / "N seconds" the provider sometimes emits.
pub fn extract_wait_secs(text: &str) -> Option<u64> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    for pair in tokens.windows(2) {
        let number = pair[0].trim_matches(|c: char| c.is_ascii_punctuation());
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if pair[1].starts_with("giây") || pair[1].starts_with("second") {
            return number.parse().ok();
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vietnamese_wait_hint_gets_the_safety_buffer() {
        let outcome = classify("Vui lòng thử lại sau 10 giây", 0);
        assert_eq!(outcome, Classification::Throttled { wait_secs: 15 });
    }

    #[test]
    fn english_wait_hint_gets_the_safety_buffer() {
        let outcome = classify("Rate limit reached, retry after 10 seconds", 3);
        assert_eq!(outcome, Classification::Throttled { wait_secs: 15 });
    }

    #[test]
    fn missing_hint_falls_back_to_exponential_backoff() {
        for (attempt, expected) in [(0, 15), (1, 30), (2, 60), (3, 120)] {
            let outcome = classify("too many requests", attempt);
            assert_eq!(outcome, Classification::Throttled { wait_secs: expected });
        }
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert!(matches!(
            classify("RATE LIMIT exceeded", 0),
            Classification::Throttled { .. }
        ));
        assert!(matches!(
            classify("Quá Nhiều Request", 1),
            Classification::Throttled { .. }
        ));
    }

    #[test]
    fn non_throttling_errors_are_fatal() {
        assert_eq!(classify("invalid symbol", 0), Classification::Fatal);
        assert_eq!(classify("connection refused", 2), Classification::Fatal);
    }

    #[test]
    fn hint_extraction_handles_both_phrasings() {
        assert_eq!(extract_wait_secs("Vui lòng thử lại sau 30 giây"), Some(30));
        assert_eq!(extract_wait_secs("please retry after 45 seconds"), Some(45));
        assert_eq!(extract_wait_secs("wait 7 seconds."), Some(7));
        assert_eq!(extract_wait_secs("no numbers here"), None);
        assert_eq!(extract_wait_secs("error 502 occurred"), None);
    }
}
