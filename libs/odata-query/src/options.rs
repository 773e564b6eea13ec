//! Query option decoding.
//!
//! Decoding never fails: malformed numbers and booleans degrade to defaults and
//! `$filter` is kept verbatim for the pipeline to parse.

use crate::scanner::split_top_level;
use crate::{ODataOrderBy, OrderKey, SortDir};

/// Nested `$expand(...)` levels decoded before deeper options are dropped.
pub const MAX_EXPAND_DEPTH: usize = 8;

/// Typed query options, decoded once per request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct QueryOptions {
    pub select: Option<Vec<String>>,
    pub orderby: ODataOrderBy,
    pub top: Option<usize>,
    pub skip: Option<usize>,
    pub count: Option<bool>,
    /// Raw `$filter` text; parsed by the pipeline.
    pub filter: Option<String>,
    pub expand: Vec<ExpandItem>,
}

/// One `$expand` entry, e.g. `Category($select=name;$top=1)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandItem {
    pub path: String,
    pub options: Option<QueryOptions>,
}

impl ExpandItem {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            options: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = Some(options);
        self
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_orderby(mut self, orderby: ODataOrderBy) -> Self {
        self.orderby = orderby;
        self
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_expand(mut self, item: ExpandItem) -> Self {
        self.expand.push(item);
        self
    }

    /// Selected fields, if `$select` restricts the projection
    #[must_use]
    pub fn selected_fields(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    /// Raw `$filter`, if present and not blank
    #[must_use]
    pub fn filter_str(&self) -> Option<&str> {
        self.filter.as_deref().filter(|f| !f.trim().is_empty())
    }

    /// Whether the client asked for `@odata.count`
    #[must_use]
    pub fn wants_count(&self) -> bool {
        self.count.unwrap_or(false)
    }
}

/// Decode a flat option map (or any sequence of pairs) into [`QueryOptions`].
///
/// Only the `$`-prefixed system options are recognized; other keys are ignored.
/// When a key repeats, the last value wins.
///
/// ```
/// use std::collections::HashMap;
/// use odata_query::decode_options;
///
/// let raw = HashMap::from([("$top", "5"), ("$orderby", "name desc, id")]);
/// let options = decode_options(&raw);
/// assert_eq!(options.top, Some(5));
/// assert_eq!(options.orderby.to_string(), "name desc, id asc");
/// ```
pub fn decode_options<I, K, V>(pairs: I) -> QueryOptions
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    decode_at_depth(pairs, 0)
}

/// Decode a raw `application/x-www-form-urlencoded` query string; a leading `?` is allowed.
pub fn decode_query_string(raw: &str) -> QueryOptions {
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    decode_options(url::form_urlencoded::parse(raw.as_bytes()))
}

fn decode_at_depth<I, K, V>(pairs: I, depth: usize) -> QueryOptions
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut options = QueryOptions::default();
    for (key, value) in pairs {
        let value = value.as_ref();
        match key.as_ref() {
            "$select" => options.select = parse_select(value),
            "$orderby" => options.orderby = parse_orderby(value),
            "$top" => options.top = Some(parse_non_negative(value)),
            "$skip" => options.skip = Some(parse_non_negative(value)),
            "$count" => options.count = Some(value.trim().eq_ignore_ascii_case("true")),
            "$filter" => options.filter = Some(value.to_owned()),
            "$expand" => options.expand = parse_expand(value, depth),
            _ => {}
        }
    }
    options
}

fn parse_select(raw: &str) -> Option<Vec<String>> {
    let fields: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_owned)
        .collect();
    (!fields.is_empty()).then_some(fields)
}

/// Format: "field1 [asc|desc], field2 [asc|desc], ...".
///
/// The direction is everything after the first whitespace run; only exactly
/// `desc` is descending.
fn parse_orderby(raw: &str) -> ODataOrderBy {
    let keys = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (field, dir) = match part.split_once(char::is_whitespace) {
                Some((field, rest)) => (field, Some(rest.trim())),
                None => (part, None),
            };
            OrderKey {
                field: field.to_owned(),
                dir: SortDir::from_token(dir),
            }
        })
        .collect();
    ODataOrderBy(keys)
}

/// Leading integer of `raw`; a negative or non-numeric value is 0, overflow saturates.
fn parse_non_negative(raw: &str) -> usize {
    let raw = raw.trim();
    if raw.starts_with('-') {
        return 0;
    }
    let unsigned = raw.strip_prefix('+').unwrap_or(raw);
    let digits_end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let digits = &unsigned[..digits_end];
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(usize::MAX)
}

fn parse_expand(raw: &str, depth: usize) -> Vec<ExpandItem> {
    split_top_level(raw, ',')
        .into_iter()
        .filter_map(|item| parse_expand_item(item.trim(), depth))
        .collect()
}

fn parse_expand_item(item: &str, depth: usize) -> Option<ExpandItem> {
    let Some(open) = item.find('(') else {
        return (!item.is_empty()).then(|| ExpandItem::new(item));
    };

    let path = item[..open].trim();
    if path.is_empty() {
        return None;
    }
    let inner = &item[open + 1..];
    let inner = inner.strip_suffix(')').unwrap_or(inner);

    if depth >= MAX_EXPAND_DEPTH {
        tracing::debug!(path, depth, "dropping $expand options nested too deeply");
        return Some(ExpandItem::new(path));
    }

    let pairs = split_top_level(inner, ';')
        .into_iter()
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()));

    Some(ExpandItem::new(path).with_options(decode_at_depth(pairs, depth + 1)))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn decode(pairs: &[(&str, &str)]) -> QueryOptions {
        decode_options(pairs.iter().copied())
    }

    #[test]
    fn test_select_and_orderby() {
        let options = decode(&[("$select", "id,name"), ("$orderby", "name desc, id")]);

        assert_eq!(options.select, Some(vec!["id".to_owned(), "name".to_owned()]));
        assert_eq!(
            options.orderby.keys(),
            &[
                OrderKey {
                    field: "name".to_owned(),
                    dir: SortDir::Desc
                },
                OrderKey {
                    field: "id".to_owned(),
                    dir: SortDir::Asc
                },
            ]
        );
    }

    #[test]
    fn test_top_skip_count() {
        let options = decode(&[("$top", "5"), ("$skip", "10"), ("$count", "true")]);
        assert_eq!(options.top, Some(5));
        assert_eq!(options.skip, Some(10));
        assert_eq!(options.count, Some(true));
        assert!(options.wants_count());
    }

    #[test]
    fn test_numeric_options_clamp_to_non_negative() {
        for (raw, expected) in [
            ("-5", 0),
            ("abc", 0),
            ("", 0),
            (" 7 ", 7),
            ("+3", 3),
            ("12abc", 12),
            ("5.9", 5),
            ("99999999999999999999999999", usize::MAX),
        ] {
            assert_eq!(parse_non_negative(raw), expected, "input {raw:?}");
        }
    }

    #[test]
    fn test_select_trims_and_drops_empty_tokens() {
        let options = decode(&[("$select", " id , ,name,")]);
        assert_eq!(options.selected_fields(), Some(&["id".to_owned(), "name".to_owned()][..]));

        let options = decode(&[("$select", " , ")]);
        assert_eq!(options.select, None);
    }

    #[test]
    fn test_orderby_direction_is_case_insensitive() {
        let options = decode(&[("$orderby", "price DESC,name   Desc , id sideways")]);
        let dirs: Vec<SortDir> = options.orderby.keys().iter().map(|k| k.dir).collect();
        assert_eq!(dirs, vec![SortDir::Desc, SortDir::Desc, SortDir::Asc]);
    }

    #[test]
    fn test_orderby_direction_is_the_whole_remainder() {
        let options = decode(&[("$orderby", "name desc extra, id\tdesc ,price asc desc")]);
        assert_eq!(options.orderby.to_string(), "name asc, id desc, price asc");
    }

    #[test]
    fn test_count_variants() {
        assert_eq!(decode(&[("$count", "TRUE")]).count, Some(true));
        assert_eq!(decode(&[("$count", "yes")]).count, Some(false));
        assert_eq!(decode(&[]).count, None);
    }

    #[test]
    fn test_filter_is_kept_verbatim_and_unknown_keys_ignored() {
        let options = decode(&[("$filter", "((broken"), ("foo", "bar"), ("$search", "x")]);
        assert_eq!(options.filter.as_deref(), Some("((broken"));
        assert_eq!(options.filter_str(), Some("((broken"));
        assert_eq!(decode(&[("$filter", "  ")]).filter_str(), None);
    }

    #[test]
    fn test_expand_items_with_nested_options() {
        let options = decode(&[(
            "$expand",
            "Category($select=name;$top=1),Supplier,Reviews($filter=contains(text, 'a;b');$orderby=rating desc)",
        )]);

        assert_eq!(options.expand.len(), 3);

        let category = &options.expand[0];
        assert_eq!(category.path, "Category");
        let nested = category.options.as_ref().unwrap();
        assert_eq!(nested.select, Some(vec!["name".to_owned()]));
        assert_eq!(nested.top, Some(1));

        assert_eq!(options.expand[1], ExpandItem::new("Supplier"));

        let reviews = options.expand[2].options.as_ref().unwrap();
        assert_eq!(reviews.filter.as_deref(), Some("contains(text, 'a;b')"));
        assert_eq!(reviews.orderby.to_string(), "rating desc");
    }

    #[test]
    fn test_expand_nested_twice() {
        let options = decode(&[("$expand", "Orders($expand=Lines($select=sku);$top=2)")]);
        let orders = options.expand[0].options.as_ref().unwrap();
        assert_eq!(orders.top, Some(2));
        let lines = orders.expand[0].options.as_ref().unwrap();
        assert_eq!(lines.select, Some(vec!["sku".to_owned()]));
    }

    #[test]
    fn test_expand_depth_is_bounded() {
        let mut raw = "Leaf".to_owned();
        for level in 0..12 {
            raw = format!("L{level}($expand={raw})");
        }
        let options = decode(&[("$expand", raw.as_str())]);

        let mut depth = 0;
        let mut current = &options;
        while let Some(next) = current.expand.first().and_then(|e| e.options.as_ref()) {
            depth += 1;
            current = next;
        }
        assert_eq!(depth, MAX_EXPAND_DEPTH);
    }

    #[test]
    fn test_decode_from_hash_map_and_query_string() {
        let map: HashMap<String, String> =
            HashMap::from([("$top".to_owned(), "3".to_owned())]);
        assert_eq!(decode_options(&map).top, Some(3));

        let options = decode_query_string("?$filter=name%20eq%20%27a%26b%27&$orderby=name+desc");
        assert_eq!(options.filter.as_deref(), Some("name eq 'a&b'"));
        assert_eq!(options.orderby.to_string(), "name desc");
    }

    #[test]
    fn test_last_value_wins() {
        let options = decode(&[("$top", "1"), ("$top", "2")]);
        assert_eq!(options.top, Some(2));
    }
}
