use chrono::{NaiveDate, Utc};

use crate::error::{AppError, Result};

/// Today's date as `YYYY-MM-DD`.
pub fn today_string() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` CLI date argument.
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("invalid date '{}', expected YYYY-MM-DD", date)))
}

/// Truncate a message for display, appending `...` when something was cut.
/// Counts characters, not bytes - provider messages are Vietnamese.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        message.to_string()
    } else {
        let cut: String = message.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_messages() {
        assert_eq!(truncate_message("hello", 10), "hello");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let message = "Vui lòng thử lại sau 10 giây, quá nhiều request";
        let truncated = truncate_message(message, 12);
        assert_eq!(truncated, "Vui lòng thử...");
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("2024-01-01").is_ok());
        assert!(parse_date("01/01/2024").is_err());
    }
}
