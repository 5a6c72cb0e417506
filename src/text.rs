//! Small text helpers for step rendering and branch names

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Truncate to `max` characters, appending `...` when anything was cut
pub fn truncate_label(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static regex is valid"))
}

/// Lowercase, collapse every run of non-alphanumerics into `-`, trim dashes
pub fn slugify(text: &str) -> String {
    separators()
        .replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Relative time such as "3 days ago"
pub fn from_now(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - date).num_seconds();
    if seconds < 45 {
        return "just now".to_string();
    }

    let (amount, unit) = match seconds {
        s if s < 60 * 60 => ((s + 30) / 60, "minute"),
        s if s < 60 * 60 * 24 => (s / 3600, "hour"),
        s if s < 60 * 60 * 24 * 30 => (s / 86_400, "day"),
        s if s < 60 * 60 * 24 * 365 => (s / (86_400 * 30), "month"),
        s => (s / (86_400 * 365), "year"),
    };
    let amount = amount.max(1);

    match (amount, unit) {
        (1, "day") => "yesterday".to_string(),
        (1, "hour") => "an hour ago".to_string(),
        (1, unit) => format!("a {unit} ago"),
        (n, unit) => format!("{n} {unit}s ago"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_truncate_long_title() {
        let title = "a".repeat(75);
        let label = truncate_label(&title, 60);
        assert_eq!(label, format!("{}...", "a".repeat(60)));
    }

    #[test]
    fn test_truncate_exact_and_short() {
        let title = "b".repeat(60);
        assert_eq!(truncate_label(&title, 60), title);
        assert_eq!(truncate_label("Fix crash", 60), "Fix crash");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let title = "é".repeat(61);
        let label = truncate_label(&title, 60);
        assert_eq!(label.chars().count(), 63);
        assert!(label.ends_with("..."));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("42-Fix crash"), "42-fix-crash");
        assert_eq!(slugify("  Add: OAuth / SSO support!  "), "add-oauth-sso-support");
        assert_eq!(slugify("7-Ünïcode títle"), "7-ünïcode-títle");
    }

    #[test]
    fn test_from_now() {
        let now = Utc::now();
        assert_eq!(from_now(now - Duration::seconds(10), now), "just now");
        assert_eq!(from_now(now - Duration::minutes(1), now), "a minute ago");
        assert_eq!(from_now(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(from_now(now - Duration::hours(1), now), "an hour ago");
        assert_eq!(from_now(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(from_now(now - Duration::days(1), now), "yesterday");
        assert_eq!(from_now(now - Duration::days(4), now), "4 days ago");
        assert_eq!(from_now(now - Duration::days(65), now), "2 months ago");
        assert_eq!(from_now(now - Duration::days(800), now), "2 years ago");
    }

    #[test]
    fn test_from_now_future_is_just_now() {
        let now = Utc::now();
        assert_eq!(from_now(now + Duration::hours(2), now), "just now");
    }
}
