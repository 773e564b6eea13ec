//! Top-level scanning for option strings.
//!
//! A position is "top level" when it sits outside every parenthesis group and
//! outside single-quoted string literals. Quote state toggles on each `'`, so a
//! doubled quote inside a literal keeps the scanner inside the string.

/// Byte offsets of every top-level occurrence of `separator`.
#[must_use]
pub fn top_level_positions(input: &str, separator: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut in_string = false;
    let mut depth: usize = 0;

    for (idx, ch) in input.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            c if c == separator && !in_string && depth == 0 => positions.push(idx),
            _ => {}
        }
    }
    positions
}

/// First top-level occurrence of `separator`, if any.
#[must_use]
pub fn find_top_level(input: &str, separator: char) -> Option<usize> {
    top_level_positions(input, separator).into_iter().next()
}

/// Split `input` on top-level `separator`s. Pieces are returned untrimmed and
/// empty pieces are kept; callers decide how to treat them.
#[must_use]
pub fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for pos in top_level_positions(input, separator) {
        pieces.push(&input[start..pos]);
        start = pos + separator.len_utf8();
    }
    pieces.push(&input[start..]);
    pieces
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_split_ignores_separators_inside_parentheses() {
        let parts = split_top_level("Category($select=id,name),Supplier", ',');
        assert_eq!(parts, vec!["Category($select=id,name)", "Supplier"]);
    }

    #[test]
    fn test_split_ignores_separators_inside_string_literals() {
        let parts = split_top_level("$filter=name eq 'a;b';$top=1", ';');
        assert_eq!(parts, vec!["$filter=name eq 'a;b'", "$top=1"]);
    }

    #[test]
    fn test_split_handles_nested_groups() {
        let parts = split_top_level("A($expand=B($top=1;$skip=2);$top=3);C", ';');
        assert_eq!(parts, vec!["A($expand=B($top=1;$skip=2);$top=3)", "C"]);
    }

    #[test]
    fn test_split_keeps_empty_pieces() {
        assert_eq!(split_top_level("a,,b,", ','), vec!["a", "", "b", ""]);
        assert_eq!(split_top_level("", ','), vec![""]);
    }

    #[test]
    fn test_find_top_level() {
        assert_eq!(find_top_level("f(a,b),c", ','), Some(6));
        assert_eq!(find_top_level("'x,y'", ','), None);
        // an unbalanced closing parenthesis does not underflow the depth
        assert_eq!(find_top_level(")a,b", ','), Some(2));
    }
}
