//! Small text helpers shared by the flag engine and ingestion.

/// Keep at most `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// The local part of an email address, used as a display name when none is given.
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Trim and collapse an optional field to `None` when blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("", 5), "");
        assert_eq!(truncate_chars(&"x".repeat(300), 250).chars().count(), 250);
    }

    #[test]
    fn test_email_local_part() {
        assert_eq!(email_local_part("sarah.chen@acme.com"), "sarah.chen");
        assert_eq!(email_local_part("jdoe"), "jdoe");
        assert_eq!(email_local_part("@acme.com"), "");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Sales ")), Some("Sales"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
