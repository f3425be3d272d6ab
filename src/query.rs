//! Query-string encoding for typed parameter objects.
//!
//! Parameter structs describe their own wire layout by implementing [`ToQuery`] and
//! feeding each field through a [`QueryEncoder`]. The encoder enforces the
//! required/optional contract, flattens nested objects into bracketed keys and renders
//! arrays in the format chosen at the call site.
//!
//! # Examples
//!
//! ```
//! use palaver::query::{ArrayFormat, QueryEncoder, ToQuery};
//!
//! struct Range {
//!     start: u32,
//!     end: Option<u32>,
//! }
//!
//! impl ToQuery for Range {
//!     fn encode(&self, enc: &mut QueryEncoder) -> palaver::Result<()> {
//!         enc.required("start", &self.start)?;
//!         enc.optional("end", self.end.as_ref());
//!         Ok(())
//!     }
//! }
//!
//! struct FindFiles {
//!     directory: String,
//!     query: Option<String>,
//!     kinds: Vec<String>,
//!     lines: Option<Range>,
//! }
//!
//! impl ToQuery for FindFiles {
//!     fn encode(&self, enc: &mut QueryEncoder) -> palaver::Result<()> {
//!         enc.required("directory", &self.directory)?;
//!         enc.optional("query", self.query.as_ref());
//!         enc.array("kind", &self.kinds, ArrayFormat::Comma);
//!         enc.nested("lines", self.lines.as_ref())?;
//!         Ok(())
//!     }
//! }
//!
//! let params = FindFiles {
//!     directory: "/repo".to_string(),
//!     query: None,
//!     kinds: vec!["file".to_string(), "dir".to_string()],
//!     lines: Some(Range { start: 1, end: None }),
//! };
//!
//! let query = QueryEncoder::encode(&params).unwrap();
//! assert_eq!(
//!     query.to_pairs(),
//!     vec![
//!         ("directory".to_string(), "/repo".to_string()),
//!         ("kind".to_string(), "file,dir".to_string()),
//!         ("lines[start]".to_string(), "1".to_string()),
//!     ]
//! );
//! ```

use crate::{Error, Result};
use std::fmt::Display;

/// How array-valued fields are written to the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayFormat {
    /// One key with all values joined by commas: `ids=a,b,c`.
    ///
    /// Commas inside a value are not escaped, so `["a,b", "c"]` reads back as three
    /// values. Use [`Repeat`](ArrayFormat::Repeat) for free-text elements.
    #[default]
    Comma,
    /// The key repeated once per value: `ids=a&ids=b&ids=c`.
    Repeat,
    /// The key suffixed with `[]` and repeated: `ids[]=a&ids[]=b`.
    Brackets,
}

/// A single encoded query entry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Rendered as one `key=value` pair.
    Single(String),
    /// Rendered as one `key=value` pair per element.
    Repeated(Vec<String>),
}

/// An ordered key to value(s) mapping, ready to be appended to a URL.
///
/// Entries keep the order in which fields were encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    entries: Vec<(String, QueryValue)>,
}

impl Query {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no keys were encoded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the encoded entries in order.
    pub fn entries(&self) -> &[(String, QueryValue)] {
        &self.entries
    }

    /// Returns the value for `key`, if encoded.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Appends an entry. Keys are not deduplicated.
    pub fn push(&mut self, key: impl Into<String>, value: QueryValue) {
        self.entries.push((key.into(), value));
    }

    /// Appends every entry of `other`.
    pub fn extend(&mut self, other: Query) {
        self.entries.extend(other.entries);
    }

    /// Flattens the query into the exact `key=value` pairs sent on the wire.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            match value {
                QueryValue::Single(v) => pairs.push((key.clone(), v.clone())),
                QueryValue::Repeated(values) => {
                    pairs.extend(values.iter().map(|v| (key.clone(), v.clone())))
                }
            }
        }
        pairs
    }

    /// Renders the query as a form-urlencoded string without a leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_pairs() {
            serializer.append_pair(&key, &value);
        }
        serializer.finish()
    }
}

/// Implemented by parameter objects that can be written as query parameters.
///
/// Fields should be encoded in declaration order so the output is reproducible.
pub trait ToQuery {
    /// Writes every field into `enc`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParamValidation`] if a required field is missing or empty.
    fn encode(&self, enc: &mut QueryEncoder) -> Result<()>;
}

/// Accumulates query entries for one parameter object.
///
/// Keys are composed under the encoder's prefix, so nested objects produce
/// `parent[child]` keys without the nested type knowing where it sits.
#[derive(Debug, Default)]
pub struct QueryEncoder {
    prefix: Option<String>,
    query: Query,
}

impl QueryEncoder {
    /// Creates an encoder for a top-level parameter object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `params` into a fresh [`Query`].
    pub fn encode<P: ToQuery + ?Sized>(params: &P) -> Result<Query> {
        let mut enc = Self::new();
        params.encode(&mut enc)?;
        Ok(enc.finish())
    }

    /// Consumes the encoder, returning the accumulated query.
    pub fn finish(self) -> Query {
        self.query
    }

    fn key(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}[{}]", prefix, name),
            None => name.to_string(),
        }
    }

    /// Encodes a required scalar. Empty renderings are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParamValidation`] naming the full key if the value renders empty.
    pub fn required<T: Display + ?Sized>(&mut self, name: &str, value: &T) -> Result<&mut Self> {
        let key = self.key(name);
        let rendered = value.to_string();
        if rendered.is_empty() {
            return Err(Error::param(key, "required query parameter is empty"));
        }
        self.query.push(key, QueryValue::Single(rendered));
        Ok(self)
    }

    /// Encodes a required field held in an `Option`, rejecting `None` as well as empty values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParamValidation`] if the value is absent or renders empty.
    pub fn required_opt<T: Display>(&mut self, name: &str, value: Option<&T>) -> Result<&mut Self> {
        match value {
            Some(value) => self.required(name, value),
            None => Err(Error::param(
                self.key(name),
                "required query parameter is missing",
            )),
        }
    }

    /// Encodes an optional scalar. `None` omits the key; `Some("")` sends an empty value.
    pub fn optional<T: Display + ?Sized>(&mut self, name: &str, value: Option<&T>) -> &mut Self {
        if let Some(value) = value {
            let key = self.key(name);
            self.query.push(key, QueryValue::Single(value.to_string()));
        }
        self
    }

    /// Encodes an optional array. An empty slice omits the key.
    pub fn array<T: Display>(&mut self, name: &str, values: &[T], format: ArrayFormat) -> &mut Self {
        if values.is_empty() {
            return self;
        }
        let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
        let key = self.key(name);
        match format {
            ArrayFormat::Comma => self.query.push(key, QueryValue::Single(rendered.join(","))),
            ArrayFormat::Repeat => self.query.push(key, QueryValue::Repeated(rendered)),
            ArrayFormat::Brackets => {
                self.query
                    .push(format!("{}[]", key), QueryValue::Repeated(rendered))
            }
        }
        self
    }

    /// Encodes a required array. An empty slice is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParamValidation`] if `values` is empty.
    pub fn required_array<T: Display>(
        &mut self,
        name: &str,
        values: &[T],
        format: ArrayFormat,
    ) -> Result<&mut Self> {
        if values.is_empty() {
            return Err(Error::param(
                self.key(name),
                "required array parameter is empty",
            ));
        }
        Ok(self.array(name, values, format))
    }

    /// Encodes an optional nested object under `name[...]` keys.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from the nested object, with the full bracketed key.
    pub fn nested<P: ToQuery + ?Sized>(&mut self, name: &str, value: Option<&P>) -> Result<&mut Self> {
        let Some(value) = value else {
            return Ok(self);
        };
        let mut child = QueryEncoder {
            prefix: Some(self.key(name)),
            query: Query::new(),
        };
        value.encode(&mut child)?;
        self.query.extend(child.query);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Time {
        start: Option<u64>,
        end: Option<u64>,
    }

    impl ToQuery for Time {
        fn encode(&self, enc: &mut QueryEncoder) -> Result<()> {
            enc.optional("start", self.start.as_ref());
            enc.optional("end", self.end.as_ref());
            Ok(())
        }
    }

    struct Filter {
        agent: String,
        time: Option<Time>,
    }

    impl ToQuery for Filter {
        fn encode(&self, enc: &mut QueryEncoder) -> Result<()> {
            enc.required("agent", &self.agent)?;
            enc.nested("time", self.time.as_ref())?;
            Ok(())
        }
    }

    struct ListMessages {
        directory: String,
        limit: Option<u32>,
        title: Option<String>,
        ids: Vec<String>,
        filter: Option<Filter>,
        format: ArrayFormat,
    }

    impl ListMessages {
        fn base() -> Self {
            Self {
                directory: "/work".to_string(),
                limit: None,
                title: None,
                ids: Vec::new(),
                filter: None,
                format: ArrayFormat::Comma,
            }
        }
    }

    impl ToQuery for ListMessages {
        fn encode(&self, enc: &mut QueryEncoder) -> Result<()> {
            enc.required("directory", &self.directory)?;
            enc.optional("limit", self.limit.as_ref());
            enc.optional("title", self.title.as_deref());
            enc.array("id", &self.ids, self.format);
            enc.nested("filter", self.filter.as_ref())?;
            Ok(())
        }
    }

    fn keys(query: &Query) -> Vec<String> {
        query.to_pairs().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_absent_optionals_are_omitted() {
        let query = QueryEncoder::encode(&ListMessages::base()).unwrap();
        assert_eq!(keys(&query), vec!["directory"]);
        assert!(query.get("limit").is_none());
        assert!(query.get("title").is_none());
    }

    #[test]
    fn test_empty_string_is_not_absence() {
        let params = ListMessages {
            title: Some(String::new()),
            ..ListMessages::base()
        };
        let query = QueryEncoder::encode(&params).unwrap();
        assert_eq!(query.get("title"), Some(&QueryValue::Single(String::new())));
        assert_eq!(query.to_query_string(), "directory=%2Fwork&title=");
    }

    #[test]
    fn test_required_empty_names_field() {
        let params = ListMessages {
            directory: String::new(),
            ..ListMessages::base()
        };
        let err = QueryEncoder::encode(&params).unwrap_err();
        assert_eq!(err.field(), Some("directory"));
    }

    #[test]
    fn test_required_opt_rejects_none() {
        let mut enc = QueryEncoder::new();
        let err = enc.required_opt::<String>("sessionID", None).unwrap_err();
        assert_eq!(err.field(), Some("sessionID"));
    }

    #[test]
    fn test_comma_array_is_single_key() {
        let params = ListMessages {
            ids: vec!["a".into(), "b".into(), "c".into()],
            ..ListMessages::base()
        };
        let pairs = QueryEncoder::encode(&params).unwrap().to_pairs();
        let ids: Vec<_> = pairs.iter().filter(|(k, _)| k == "id").collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].1, "a,b,c");
    }

    #[test]
    fn test_repeat_array_is_one_key_per_value() {
        let params = ListMessages {
            ids: vec!["a".into(), "b".into(), "c".into()],
            format: ArrayFormat::Repeat,
            ..ListMessages::base()
        };
        let pairs = QueryEncoder::encode(&params).unwrap().to_pairs();
        let ids: Vec<_> = pairs
            .iter()
            .filter(|(k, _)| k == "id")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_embedded_commas_survive_only_in_repeat_format() {
        let ids = vec!["a,b".to_string(), "c".to_string()];
        let values = |format| -> Vec<String> {
            let params = ListMessages {
                ids: ids.clone(),
                format,
                ..ListMessages::base()
            };
            QueryEncoder::encode(&params)
                .unwrap()
                .to_pairs()
                .into_iter()
                .filter(|(k, _)| k == "id")
                .map(|(_, v)| v)
                .collect()
        };

        assert_eq!(values(ArrayFormat::Comma), vec!["a,b,c"]);
        assert_eq!(values(ArrayFormat::Repeat), vec!["a,b", "c"]);
    }

    #[test]
    fn test_brackets_array() {
        let params = ListMessages {
            ids: vec!["x".into(), "y".into()],
            format: ArrayFormat::Brackets,
            ..ListMessages::base()
        };
        let query = QueryEncoder::encode(&params).unwrap();
        assert_eq!(query.to_query_string(), "directory=%2Fwork&id%5B%5D=x&id%5B%5D=y");
    }

    #[test]
    fn test_required_array_rejects_empty() {
        let mut enc = QueryEncoder::new();
        let err = enc
            .required_array::<String>("paths", &[], ArrayFormat::Repeat)
            .unwrap_err();
        assert_eq!(err.field(), Some("paths"));
    }

    #[test]
    fn test_nested_objects_flatten_with_brackets() {
        let params = ListMessages {
            filter: Some(Filter {
                agent: "build".to_string(),
                time: Some(Time {
                    start: Some(10),
                    end: None,
                }),
            }),
            ..ListMessages::base()
        };
        let query = QueryEncoder::encode(&params).unwrap();
        assert_eq!(
            keys(&query),
            vec!["directory", "filter[agent]", "filter[time][start]"]
        );
    }

    #[test]
    fn test_nested_required_error_uses_full_key() {
        let params = ListMessages {
            filter: Some(Filter {
                agent: String::new(),
                time: None,
            }),
            ..ListMessages::base()
        };
        let err = QueryEncoder::encode(&params).unwrap_err();
        assert_eq!(err.field(), Some("filter[agent]"));
    }

    #[test]
    fn test_output_follows_declaration_order() {
        let params = ListMessages {
            limit: Some(5),
            title: Some("t".to_string()),
            ids: vec!["1".into()],
            ..ListMessages::base()
        };
        let first = QueryEncoder::encode(&params).unwrap();
        let second = QueryEncoder::encode(&params).unwrap();
        assert_eq!(keys(&first), vec!["directory", "limit", "title", "id"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_query_string_parses_back_to_same_pairs() {
        let params = ListMessages {
            limit: Some(20),
            title: Some("a&b=c d".to_string()),
            ids: vec!["m1".into(), "m2".into()],
            format: ArrayFormat::Repeat,
            filter: Some(Filter {
                agent: "plan".to_string(),
                time: Some(Time {
                    start: Some(1),
                    end: Some(2),
                }),
            }),
            ..ListMessages::base()
        };
        let query = QueryEncoder::encode(&params).unwrap();
        let rendered = query.to_query_string();
        let parsed: Vec<(String, String)> = url::form_urlencoded::parse(rendered.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(parsed, query.to_pairs());

        let again = QueryEncoder::encode(&params).unwrap().to_query_string();
        assert_eq!(rendered, again);
    }
}
