/// Character-window helpers used by scoring and prompt building.
///
/// Every length here counts Unicode scalar values, never bytes, so Korean
/// text is cut on character boundaries.

/// Returns the prefix of `text` holding at most `max_chars` characters.
#[must_use]
pub fn leading_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Owned variant of [`leading_chars`].
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    leading_chars(text, max_chars).to_string()
}

/// Number of characters in `text`.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_chars_counts_characters_not_bytes() {
        let text = "금리 인상 발표";
        assert_eq!(leading_chars(text, 2), "금리");
        assert_eq!(leading_chars(text, 100), text);
    }

    #[test]
    fn leading_chars_handles_empty_and_zero() {
        assert_eq!(leading_chars("", 5), "");
        assert_eq!(leading_chars("abc", 0), "");
    }

    #[test]
    fn truncate_chars_returns_owned_prefix() {
        assert_eq!(truncate_chars("서울 아파트 매매", 5), "서울 아파");
    }

    #[test]
    fn char_len_matches_scalar_count() {
        assert_eq!(char_len("부동산"), 3);
        assert_eq!(char_len("abc"), 3);
    }
}
