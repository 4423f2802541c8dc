//! Filter and DN value escaping.
//!
//! Filter values (RFC 4515) and DN attribute values (RFC 4514) have
//! different metacharacters. A value must be escaped for the context it
//! is substituted into, never both.

/// Escapes special characters in LDAP filter values (RFC 4515).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}

/// Escapes special characters in a DN attribute value (RFC 4514).
///
/// - `, + " \ < > ; =` are prefixed with a backslash
/// - NUL becomes `\00`
/// - a leading or trailing space becomes `\20`
/// - a leading `#` becomes `\23`
#[must_use]
pub fn escape_dn_value(value: &str) -> String {
    let count = value.chars().count();
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == count;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if is_first || is_last => result.push_str("\\20"),
            '#' if is_first => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

/// Reverses [`escape_filter_value`] and any other `\XX` hex escape.
///
/// Malformed escapes are kept literally.
#[must_use]
pub fn unescape_filter_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
