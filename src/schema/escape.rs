//! Java-literal escaping for row-format strings.
//!
//! Row formats such as `FIELDS TERMINATED BY '\t'` travel through templating
//! that interprets escapes, so they are stored escaped the way a Java string
//! literal would be: quotes, backslashes and control characters are escaped,
//! anything outside printable ASCII becomes `\uXXXX`.

/// Escape `input` as the body of a Java string literal.
pub fn escape_java(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 32 || (c as u32) > 0x7f => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_java`], also accepting octal escapes and `\'`.
///
/// A backslash before a character with no escape meaning is dropped. A
/// malformed `\u` escape is kept literally.
pub fn unescape_java(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut units: Vec<u16> = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' || i + 1 >= chars.len() {
            push_char(&mut units, c);
            i += 1;
            continue;
        }

        let next = chars[i + 1];
        match next {
            '\\' => push_char(&mut units, '\\'),
            '"' => push_char(&mut units, '"'),
            '\'' => push_char(&mut units, '\''),
            'b' => push_char(&mut units, '\u{8}'),
            'n' => push_char(&mut units, '\n'),
            't' => push_char(&mut units, '\t'),
            'f' => push_char(&mut units, '\u{c}'),
            'r' => push_char(&mut units, '\r'),
            'u' => {
                if let Some((unit, consumed)) = unicode_escape(&chars[i + 1..]) {
                    units.push(unit);
                    i += 1 + consumed;
                } else {
                    push_char(&mut units, '\\');
                    i += 1;
                }
                continue;
            }
            '0'..='7' => {
                let (value, consumed) = octal_escape(&chars[i + 1..]);
                units.push(value);
                i += 1 + consumed;
                continue;
            }
            other => push_char(&mut units, other),
        }
        i += 2;
    }

    String::from_utf16_lossy(&units)
}

fn push_char(units: &mut Vec<u16>, c: char) {
    let mut buf = [0u16; 2];
    units.extend_from_slice(c.encode_utf16(&mut buf));
}

/// Parse `u+XXXX` / `uuXXXX` starting at `rest[0] == 'u'`.
fn unicode_escape(rest: &[char]) -> Option<(u16, usize)> {
    let mut pos = 0;
    while pos < rest.len() && rest[pos] == 'u' {
        pos += 1;
    }
    if pos < rest.len() && rest[pos] == '+' {
        pos += 1;
    }
    let digits = rest.get(pos..pos + 4)?;
    if !digits.iter().all(char::is_ascii_hexdigit) {
        return None;
    }
    let hex: String = digits.iter().collect();
    let unit = u16::from_str_radix(&hex, 16).ok()?;
    Some((unit, pos + 4))
}

/// Parse up to three octal digits; three only when the first is `0`-`3`.
fn octal_escape(rest: &[char]) -> (u16, usize) {
    let max = if rest[0] <= '3' { 3 } else { 2 };
    let mut value = 0u16;
    let mut consumed = 0;
    while consumed < max && consumed < rest.len() {
        let Some(digit) = rest[consumed].to_digit(8) else {
            break;
        };
        value = value * 8 + digit as u16;
        consumed += 1;
    }
    (value, consumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_control_characters() {
        assert_eq!(escape_java("a\tb\nc"), "a\\tb\\nc");
        assert_eq!(escape_java("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_java("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_escape_non_ascii() {
        assert_eq!(escape_java("caf\u{e9}"), "caf\\u00E9");
        assert_eq!(escape_java("\u{1}"), "\\u0001");
        assert_eq!(escape_java("\u{1F600}"), "\\uD83D\\uDE00");
    }

    #[test]
    fn test_unescape_reverses_escape() {
        let raw = "FIELDS TERMINATED BY '\\t'\nLINES \"x\" caf\u{e9} \u{1F600}";
        assert_eq!(unescape_java(&escape_java(raw)), raw);
    }

    #[test]
    fn test_unescape_octal_and_single_quote() {
        assert_eq!(unescape_java("\\001\\'"), "\u{1}'");
        assert_eq!(unescape_java("\\101B"), "AB");
    }

    #[test]
    fn test_unescape_keeps_malformed_unicode() {
        assert_eq!(unescape_java("\\u12"), "\\u12");
        assert_eq!(unescape_java("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_unescape_unicode_requires_hex_digits() {
        assert_eq!(unescape_java("\\u++12A"), "\\u++12A");
        assert_eq!(unescape_java("\\u-12A"), "\\u-12A");
        assert_eq!(unescape_java("\\u+0041"), "A");
        assert_eq!(unescape_java("\\uu00e9"), "é");
    }

    #[test]
    fn test_unescape_drops_meaningless_backslash() {
        assert_eq!(unescape_java("\\q"), "q");
    }
}
