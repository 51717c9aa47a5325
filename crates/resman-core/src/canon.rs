use serde::Serialize;

/// Encode a value as a single compact JSON line with every non-ASCII
/// character escaped as `\uXXXX` (UTF-16 code units, so characters outside
/// the BMP become surrogate pairs). No trailing newline.
///
/// serde_json only ever emits non-ASCII inside string literals, so escaping
/// them after serialization is always valid JSON.
pub fn ascii_json_line<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let raw = serde_json::to_string(value)?;
    Ok(escape_non_ascii(&raw))
}

fn escape_non_ascii(raw: &str) -> String {
    if raw.is_ascii() {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len() + 16);
    let mut units = [0u16; 2];
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}
