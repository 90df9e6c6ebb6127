//! Header sanitization for close-attribution logs.
//!
//! Request headers end up in structured logs verbatim otherwise; control
//! and Unicode format characters can forge log lines or break terminal
//! rendering, so they are flattened before logging.

/// Maximum sanitized length in UTF-16 code units.
const MAX_UNITS: usize = 300;

fn is_disallowed(c: char) -> bool {
    let code = c as u32;
    code <= 0x1F
        || (0x7F..=0x9F).contains(&code)
        // Unicode format characters (Cf): zero-width joiners, bidi
        // overrides, and friends.
        || matches!(code,
            0x00AD
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0x110BD
            | 0x1D173..=0x1D17A
            | 0xE0001
            | 0xE0020..=0xE007F)
}

/// Replace disallowed characters with spaces, collapse whitespace runs,
/// trim, and cap at 300 UTF-16 code units without splitting a surrogate
/// pair.
pub fn sanitize_header_value(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if is_disallowed(c) { ' ' } else { c })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    // Cap by UTF-16 units; chars never split surrogate pairs, so simply
    // stop before the char that would overflow.
    let mut out = String::new();
    let mut units = 0usize;
    for c in collapsed.chars() {
        let len = c.len_utf16();
        if units + len > MAX_UNITS {
            break;
        }
        units += len;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_characters_become_spaces_and_collapse() {
        assert_eq!(
            sanitize_header_value("Mozilla/5.0\r\n\tInjected: yes"),
            "Mozilla/5.0 Injected: yes"
        );
        assert_eq!(sanitize_header_value("  a   b  "), "a b");
    }

    #[test]
    fn format_characters_stripped() {
        // Bidi override and zero-width space.
        assert_eq!(sanitize_header_value("abc\u{202E}def\u{200B}g"), "abc def g");
    }

    #[test]
    fn caps_at_300_utf16_units() {
        let long = "x".repeat(400);
        assert_eq!(sanitize_header_value(&long).len(), 300);
    }

    #[test]
    fn never_splits_surrogate_pairs() {
        // Each emoji is 2 UTF-16 units; 299 + 2 overflows the cap, so the
        // cut lands before the emoji rather than through it.
        let mut value = "x".repeat(299);
        value.push_str("😀😀");
        let out = sanitize_header_value(&value);
        assert_eq!(out.encode_utf16().count(), 299);
        assert!(out.ends_with('x'));

        // With room for exactly one pair, the emoji survives whole.
        let mut value = "x".repeat(298);
        value.push_str("😀😀");
        let out = sanitize_header_value(&value);
        assert_eq!(out.encode_utf16().count(), 300);
        assert!(out.ends_with('😀'));
    }

    #[test]
    fn plain_values_untouched() {
        assert_eq!(sanitize_header_value("application/json"), "application/json");
    }
}
