//! Collection pipeline: filter → order → paginate → project → expand.
//!
//! Stages never mutate the caller's records. Filtering, ordering and paging work
//! on borrowed records; only the final page is cloned for projection.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::sync::LazyLock;

use serde_json::{Map, Value as JsonValue};
use url::Url;

use crate::ast::PropertyPath;
use crate::config::{OnFilterError, QueryConfig};
use crate::envelope::{Envelope, build_envelope, next_page_link};
use crate::eval::Evaluator;
use crate::functions::FunctionTable;
use crate::options::{ExpandItem, QueryOptions};
use crate::parser::parse_filter_with_limits;
use crate::{Error, ODataOrderBy, SortDir};

static DEFAULT_PIPELINE: LazyLock<Pipeline> = LazyLock::new(Pipeline::default);

/// Applies decoded [`QueryOptions`] to in-memory collections.
///
/// A pipeline holds no per-request state and can be shared between threads.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    config: QueryConfig,
    functions: FunctionTable,
}

struct Shaped {
    value: Vec<JsonValue>,
    matched: usize,
    skip: usize,
    top: Option<usize>,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: QueryConfig) -> Self {
        Self {
            config,
            functions: FunctionTable::builtin(),
        }
    }

    /// Replace the function table used by `$filter` calls.
    #[must_use]
    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    /// Keep the records matching `$filter`.
    ///
    /// A missing or blank filter keeps everything. A filter that fails to parse is
    /// handled according to [`QueryConfig::on_filter_error`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilter`] only under [`OnFilterError::Propagate`].
    pub fn filter<'r>(
        &self,
        records: &'r [JsonValue],
        options: &QueryOptions,
    ) -> Result<Vec<&'r JsonValue>, Error> {
        let Some(raw) = options.filter_str() else {
            return Ok(records.iter().collect());
        };

        match parse_filter_with_limits(raw, &self.config.limits) {
            Ok(parsed) => {
                let evaluator = Evaluator::new(&self.functions);
                let expr = parsed.as_expr();
                Ok(records
                    .iter()
                    .filter(|record| evaluator.matches(expr, record))
                    .collect())
            }
            Err(err) => match self.config.on_filter_error {
                OnFilterError::Ignore => {
                    tracing::warn!(
                        error = %err,
                        filter = raw,
                        "ignoring invalid $filter, returning collection unfiltered"
                    );
                    Ok(records.iter().collect())
                }
                OnFilterError::Propagate => Err(err),
            },
        }
    }

    /// Run every stage and return the shaped records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilter`] only under [`OnFilterError::Propagate`],
    /// including for filters nested in `$expand` options.
    pub fn run(&self, records: &[JsonValue], options: &QueryOptions) -> Result<Vec<JsonValue>, Error> {
        self.shape(records, options).map(|shaped| shaped.value)
    }

    /// Run every stage and wrap the page in an [`Envelope`].
    ///
    /// `@odata.count` is the number of records that passed the filter, reported when
    /// `$count=true`. `@odata.nextLink` is derived from `request_url` when the page
    /// was cut short by [`crate::ODataLimits::max_top`] and more records remain.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::run`].
    pub fn execute(
        &self,
        records: &[JsonValue],
        options: &QueryOptions,
        context_url: &str,
        request_url: Option<&Url>,
    ) -> Result<Envelope, Error> {
        let shaped = self.shape(records, options)?;

        let count = options
            .wants_count()
            .then(|| u64::try_from(shaped.matched).unwrap_or(u64::MAX));

        let page_len = shaped.value.len();
        let next_skip = shaped.skip.saturating_add(page_len);
        let server_capped = shaped
            .top
            .is_some_and(|top| options.top.is_none_or(|requested| top < requested));
        let next_link = request_url
            .filter(|_| server_capped && next_skip < shaped.matched)
            .map(|url| {
                let remaining = options
                    .top
                    .map(|requested| requested.saturating_sub(page_len));
                next_page_link(url, next_skip, remaining)
            });

        Ok(build_envelope(context_url, shaped.value, count, next_link))
    }

    /// Materialize the `$expand` items on one projected record.
    ///
    /// Missing top-level properties are inserted as `null`. Present values with
    /// nested options go through the full pipeline: arrays directly, any other
    /// value as a one-element collection that is unwrapped afterwards.
    ///
    /// # Errors
    ///
    /// Propagates nested filter errors under [`OnFilterError::Propagate`].
    pub fn expand(&self, record: &mut JsonValue, items: &[ExpandItem]) -> Result<(), Error> {
        let Some(map) = record.as_object_mut() else {
            return Ok(());
        };

        for item in items {
            let slot = map.entry(item.path.clone()).or_insert(JsonValue::Null);
            let Some(nested) = &item.options else {
                continue;
            };
            if slot.is_null() {
                continue;
            }

            let shaped = match &*slot {
                JsonValue::Array(children) => JsonValue::Array(self.run(children, nested)?),
                single => self
                    .run(std::slice::from_ref(single), nested)?
                    .into_iter()
                    .next()
                    .unwrap_or(JsonValue::Null),
            };
            *slot = shaped;
        }
        Ok(())
    }

    fn shape(&self, records: &[JsonValue], options: &QueryOptions) -> Result<Shaped, Error> {
        let filtered = self.filter(records, options)?;
        let matched = filtered.len();

        let ordered = order(filtered, &options.orderby);

        let skip = options.skip.unwrap_or(0);
        let top = self.config.limits.effective_top(options.top);
        let page = paginate(ordered, Some(skip), top);

        let selection = selection_with_expands(options);
        let mut value = project(&page, selection.as_deref());
        if !options.expand.is_empty() {
            for record in &mut value {
                self.expand(record, &options.expand)?;
            }
        }

        tracing::debug!(
            input = records.len(),
            matched,
            returned = value.len(),
            "applied OData query options"
        );

        Ok(Shaped {
            value,
            matched,
            skip,
            top,
        })
    }
}

/// `$select` plus the top-level property of every `$expand` item.
fn selection_with_expands(options: &QueryOptions) -> Option<Vec<String>> {
    let mut fields = options.select.clone()?;
    for item in &options.expand {
        if !fields.contains(&item.path) {
            fields.push(item.path.clone());
        }
    }
    Some(fields)
}

/// Run the pipeline with the default configuration (fail-open filtering).
#[must_use]
pub fn run_pipeline(records: &[JsonValue], options: &QueryOptions) -> Vec<JsonValue> {
    DEFAULT_PIPELINE.run(records, options).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "OData pipeline failed, returning collection unchanged");
        records.to_vec()
    })
}

/// Stable multi-key sort.
///
/// For each key in turn: two null/absent values tie; a single null sorts first
/// ascending and last descending; otherwise values compare naturally. Records
/// tied on every key keep their input order.
pub fn order<R: Borrow<JsonValue>>(mut records: Vec<R>, orderby: &ODataOrderBy) -> Vec<R> {
    if orderby.is_empty() {
        return records;
    }

    let keys: Vec<(PropertyPath, SortDir)> = orderby
        .keys()
        .iter()
        .map(|key| (PropertyPath::parse(&key.field), key.dir))
        .collect();

    records.sort_by(|a, b| compare_records(a.borrow(), b.borrow(), &keys));
    records
}

fn compare_records(a: &JsonValue, b: &JsonValue, keys: &[(PropertyPath, SortDir)]) -> Ordering {
    for (path, dir) in keys {
        let left = path.resolve(a).filter(|v| !v.is_null());
        let right = path.resolve(b).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => continue,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_json(x, y),
        };
        let ordering = dir.apply(ordering);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over non-null JSON: values of one kind compare naturally, mixed
/// kinds rank bool < number < string < array < object.
fn compare_json(a: &JsonValue, b: &JsonValue) -> Ordering {
    fn rank(value: &JsonValue) -> u8 {
        match value {
            JsonValue::Null => 0,
            JsonValue::Bool(_) => 1,
            JsonValue::Number(_) => 2,
            JsonValue::String(_) => 3,
            JsonValue::Array(_) => 4,
            JsonValue::Object(_) => 5,
        }
    }

    match (a, b) {
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Skip `skip` records, then keep at most `top`; both clamp to the collection.
pub fn paginate<T>(records: Vec<T>, skip: Option<usize>, top: Option<usize>) -> Vec<T> {
    records
        .into_iter()
        .skip(skip.unwrap_or(0))
        .take(top.unwrap_or(usize::MAX))
        .collect()
}

/// Keep only the selected top-level properties that exist on each record.
///
/// Without a selection each record is cloned unchanged; non-object records are
/// always passed through.
pub fn project<R: Borrow<JsonValue>>(records: &[R], select: Option<&[String]>) -> Vec<JsonValue> {
    match select {
        Some(fields) if !fields.is_empty() => records
            .iter()
            .map(|record| project_record(record.borrow(), fields))
            .collect(),
        _ => records.iter().map(|record| record.borrow().clone()).collect(),
    }
}

fn project_record(record: &JsonValue, fields: &[String]) -> JsonValue {
    let Some(map) = record.as_object() else {
        return record.clone();
    };
    let projected: Map<String, JsonValue> = fields
        .iter()
        .filter_map(|field| map.get(field).map(|value| (field.clone(), value.clone())))
        .collect();
    JsonValue::Object(projected)
}
