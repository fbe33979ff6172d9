// Reversible character escaping for the inline logging-command format.
// Implemented as an ordered substitution pipeline: escape walks the mappings
// top to bottom, unescape walks them bottom to top so that `%25` is restored
// last and never re-expands into one of the other escapes.

/// One substitution rule of the codec.
struct EscapeMapping {
    token: &'static str,
    replacement: &'static str,
}

/// Escape mappings in application order. `%` must come first on escape
/// (so replacement text is not double-encoded) and last on unescape.
/// `=` is intentionally absent: it is not a field separator at any position
/// where escaped text appears.
const ESCAPE_MAPPINGS: &[EscapeMapping] = &[
    EscapeMapping { token: "%",  replacement: "%25" },
    EscapeMapping { token: "\r", replacement: "%0D" },
    EscapeMapping { token: "\n", replacement: "%0A" },
    EscapeMapping { token: ";",  replacement: "%3B" },
];

/// Escape a raw value for embedding in an inline logging command.
pub fn escape(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let mut escaped = raw.to_string();
    for mapping in ESCAPE_MAPPINGS {
        escaped = escaped.replace(mapping.token, mapping.replacement);
    }
    escaped
}

/// Unescape a wire value back to raw text.
///
/// Unknown `%xx` sequences are left verbatim: a literal `%` followed by two
/// hex digits that is not one of the four defined escapes must survive a
/// decode untouched.
pub fn unescape(escaped: &str) -> String {
    if escaped.is_empty() {
        return String::new();
    }
    let mut raw = escaped.to_string();
    for mapping in ESCAPE_MAPPINGS.iter().rev() {
        raw = raw.replace(mapping.replacement, mapping.token);
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_tokens() {
        assert_eq!(escape(";-\r-\n"), "%3B-%0D-%0A");
        assert_eq!(escape("100%"), "100%25");
    }

    #[test]
    fn test_equals_never_escaped() {
        assert_eq!(escape(";=\r=\n"), "%3B=%0D=%0A");
    }

    #[test]
    fn test_round_trip() {
        for raw in ["plain", "a;b", "line1\nline2", "cr\rlf\n", "%", "%3B", "%%25"] {
            assert_eq!(unescape(&escape(raw)), raw, "round trip failed for {raw:?}");
        }
    }

    #[test]
    fn test_unescape_unknown_sequences_verbatim() {
        assert_eq!(unescape("%2F%20%FF"), "%2F%20%FF");
        assert_eq!(unescape("%0A%2F"), "\n%2F");
    }

    #[test]
    fn test_escaped_percent_does_not_double_decode() {
        // Raw "%0A" escapes to "%250A" and must come back as "%0A", not "\n".
        assert_eq!(escape("%0A"), "%250A");
        assert_eq!(unescape("%250A"), "%0A");
    }

    #[test]
    fn test_empty() {
        assert_eq!(escape(""), "");
        assert_eq!(unescape(""), "");
    }
}
