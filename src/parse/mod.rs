//! Readers for the text and XML inputs: contour galleries, patch surfaces,
//! wrapped surfaces, OBJ meshes, command scripts and render settings.
//!
//! The line-oriented formats share the same lexical rules: `#` starts a
//! comment, blank lines are skipped and tokens are separated by whitespace.

pub mod config_xml;
pub mod contour_file;
pub mod obj_mesh;
pub mod script;
pub mod surface_file;
pub mod wrapped_file;

use std::str::FromStr;

/// Non-empty lines of `text` with comments stripped, numbered from 1.
pub(crate) fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().filter_map(|(i, raw)| {
        let line = raw.split_once('#').map_or(raw, |(code, _)| code).trim();
        (!line.is_empty()).then_some((i + 1, line))
    })
}

/// Parses one token, naming `what` in the message on failure.
pub(crate) fn token<T: FromStr>(value: &str, what: &str) -> Result<T, String> {
    value.parse().map_err(|_| format!("invalid {what} `{value}`"))
}

/// Parses exactly `N` floats from `tokens`.
pub(crate) fn floats<const N: usize>(tokens: &[&str], what: &str) -> Result<[f64; N], String> {
    if tokens.len() != N {
        return Err(format!("{what} needs {N} numbers, got {}", tokens.len()));
    }
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(tokens) {
        *slot = token(value, what)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# header\n\nfoo 1 # trailing\n   \nbar\n";
        let lines: Vec<_> = content_lines(text).collect();
        assert_eq!(lines, vec![(3, "foo 1"), (5, "bar")]);
    }

    #[test]
    fn float_lists_check_their_length() {
        assert_eq!(floats::<2>(&["1", "2.5"], "point").unwrap(), [1.0, 2.5]);
        assert!(floats::<3>(&["1", "2"], "point").is_err());
        assert!(floats::<1>(&["x"], "size").unwrap_err().contains("`x`"));
    }
}
