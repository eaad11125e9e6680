//! IRC case-mapping functions.
//!
//! IRC comparisons use the `rfc1459` case mapping, where a handful of
//! punctuation characters are considered case pairs in addition to ASCII.

/// Convert a single character to IRC lowercase using RFC 1459 case mapping.
///
/// In addition to ASCII lowercase conversion, this maps:
/// - `[` → `{`
/// - `]` → `}`
/// - `\` → `|`
/// - `~` → `^`
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => (c as u8 + 32) as char,
        _ => c,
    }
}

/// Convert a string to IRC lowercase using RFC 1459 case mapping.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Compare two strings using IRC case-insensitive comparison.
pub fn irc_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.chars()
        .zip(b.chars())
        .all(|(ca, cb)| irc_lower_char(ca) == irc_lower_char(cb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irc_lower_char() {
        assert_eq!(irc_lower_char('A'), 'a');
        assert_eq!(irc_lower_char('Z'), 'z');
        assert_eq!(irc_lower_char('['), '{');
        assert_eq!(irc_lower_char(']'), '}');
        assert_eq!(irc_lower_char('\\'), '|');
        assert_eq!(irc_lower_char('~'), '^');
        assert_eq!(irc_lower_char('0'), '0');
    }

    #[test]
    fn test_irc_to_lower() {
        assert_eq!(irc_to_lower("#Test"), "#test");
        assert_eq!(irc_to_lower("Nick[away]"), "nick{away}");
    }

    #[test]
    fn test_irc_eq() {
        assert!(irc_eq("#Chan", "#chan"));
        assert!(irc_eq("foo[1]", "FOO{1}"));
        assert!(!irc_eq("#chan", "#chat"));
        assert!(!irc_eq("#chan", "#chann"));
    }
}
