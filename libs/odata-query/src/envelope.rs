//! `OData` JSON result envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use url::Url;

/// Response body for a collection request.
///
/// ```json
/// {"@odata.context": "...", "@odata.count": 2, "value": [...], "@odata.nextLink": "..."}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "@odata.context")]
    pub context: String,
    #[serde(
        rename = "@odata.count",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub count: Option<u64>,
    pub value: Vec<JsonValue>,
    #[serde(
        rename = "@odata.nextLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub next_link: Option<String>,
}

impl Envelope {
    /// The envelope as a JSON object, metadata keys present only when set.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        let mut map = Map::new();
        map.insert("@odata.context".to_owned(), JsonValue::String(self.context));
        if let Some(count) = self.count {
            map.insert("@odata.count".to_owned(), JsonValue::from(count));
        }
        map.insert("value".to_owned(), JsonValue::Array(self.value));
        if let Some(link) = self.next_link {
            map.insert("@odata.nextLink".to_owned(), JsonValue::String(link));
        }
        JsonValue::Object(map)
    }
}

/// Wrap a page of records. The caller supplies `count` (post-filter, pre-paging)
/// and `next_link`; the builder computes neither.
#[must_use]
pub fn build_envelope(
    context_url: impl Into<String>,
    records: Vec<JsonValue>,
    count: Option<u64>,
    next_link: Option<String>,
) -> Envelope {
    Envelope {
        context: context_url.into(),
        count,
        value: records,
        next_link,
    }
}

/// `request` with `$skip` set to `skip` and `$top` set to `top` (removed when `None`).
/// All other query parameters are kept in their original order.
#[must_use]
pub fn next_page_link(request: &Url, skip: usize, top: Option<usize>) -> String {
    let retained: Vec<(String, String)> = request
        .query_pairs()
        .filter(|(key, _)| key != "$skip" && key != "$top")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut next = request.clone();
    {
        let mut query = next.query_pairs_mut();
        query.clear();
        query.extend_pairs(retained);
        if let Some(top) = top {
            query.append_pair("$top", &top.to_string());
        }
        query.append_pair("$skip", &skip.to_string());
    }
    next.into()
}
