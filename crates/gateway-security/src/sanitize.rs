//! Prompt sanitization.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters outside the prompt allow-list: word characters, whitespace and
/// `. , ! ? ' " -`.
#[allow(clippy::expect_used)]
static DISALLOWED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^\w\s\.,!?'"-]"#).expect("prompt allow-list pattern is valid")
});

/// Sanitize a prompt before it is sent to a provider.
///
/// Removes NUL characters, strips everything outside the allow-list, collapses
/// whitespace runs to a single space and trims. Applying it twice yields the
/// same result as applying it once.
#[must_use]
pub fn sanitize_prompt(prompt: &str) -> String {
    let without_nul = prompt.replace('\0', "");
    let allowed = DISALLOWED.replace_all(&without_nul, "");

    allowed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a prompt is already in sanitized form
#[must_use]
pub fn is_sanitized(prompt: &str) -> bool {
    sanitize_prompt(prompt) == prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_disallowed_characters() {
        assert_eq!(
            sanitize_prompt("Hello <script>alert(1)</script> world!"),
            "Hello scriptalert1script world!"
        );
        assert_eq!(sanitize_prompt("a;b|c$d`e"), "abcde");
    }

    #[test]
    fn test_keeps_allowed_punctuation() {
        let prompt = r#"Is it "fine", isn't it - yes. Really? Yes!"#;
        assert_eq!(sanitize_prompt(prompt), prompt);
    }

    #[test]
    fn test_removes_nul_and_collapses_whitespace() {
        assert_eq!(sanitize_prompt("  one\0two \n\t three  "), "onetwo three");
    }

    #[test]
    fn test_keeps_unicode_word_characters() {
        assert_eq!(sanitize_prompt("café naïve 東京"), "café naïve 東京");
    }

    #[test]
    fn test_stripping_cannot_leave_double_spaces() {
        assert_eq!(sanitize_prompt("a @ b"), "a b");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "",
            "   ",
            "plain text",
            "tabs\tand\nnewlines",
            "symbols @#$%^&*() between words",
            "a \0 @ \0 b",
            "  \u{a0}non-breaking\u{2003}spaces  ",
            "emoji 🙂 and => arrows",
        ];

        for input in inputs {
            let once = sanitize_prompt(input);
            assert_eq!(sanitize_prompt(&once), once, "input: {input:?}");
            assert!(is_sanitized(&once));
        }
    }
}
