//! Filesystem-name sanitization for manga and chapter titles.
//!
//! Titles come from scraped metadata and routinely contain characters that
//! are unsafe or awkward in directory names. The mapping is a fixed table
//! applied character by character, so the same title always yields the same
//! folder name across runs (resume depends on this).

/// Sanitizes a title for use as a file or directory name.
///
/// | Input | Output |
/// |-------|--------|
/// | `/ \ " ' $ # @ ~ \| : + =` | `_` |
/// | `{ } [ ]` | `-` |
/// | `* %` | space |
/// | `&` | ` - ` |
/// | `?` | removed |
///
/// All other characters pass through unchanged.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '/' | '\\' | '"' | '\'' | '$' | '#' | '@' | '~' | '|' | ':' | '+' | '=' => {
                out.push('_');
            }
            '{' | '}' | '[' | ']' => out.push('-'),
            '*' | '%' => out.push(' '),
            '&' => out.push_str(" - "),
            '?' => {}
            _ => out.push(c),
        }
    }
    out
}
