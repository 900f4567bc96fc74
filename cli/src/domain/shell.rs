//! POSIX shell quoting for command strings sent to remote hosts.

/// Quote `value` as a single shell word.
///
/// Plain words (alphanumerics and `-_./:@=`) pass through unchanged.
#[must_use]
pub fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
