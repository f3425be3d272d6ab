//! Response body decoding, including discriminated-union payloads.
//!
//! Ordinary shapes decode structurally with serde: unknown fields are ignored and a
//! missing required field fails with a message naming it.
//!
//! Tagged shapes go through [`Discriminated`], which reads only the discriminator up
//! front and keeps the raw payload. A variant is "active" only if the tag matches
//! *and* the whole payload decodes as that variant; anything else is a plain
//! negative answer, never an error. An absent or unrecognized tag is a valid,
//! untagged value, so new server-side states do not break old clients.

use crate::Error;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Decodes a successful response body into `T`.
///
/// An empty (or whitespace-only) body is read as JSON `null`, so `()` and `Option<_>`
/// targets accept `204 No Content`.
///
/// # Errors
///
/// Returns [`Error::Decode`] carrying the raw body and serde's message.
pub fn decode_body<T: DeserializeOwned>(raw: &str, status: StatusCode) -> Result<T, Error> {
    let source = if raw.trim().is_empty() { "null" } else { raw };

    serde_json::from_str::<T>(source).map_err(|e| {
        tracing::error!(
            error = %e,
            raw_response = %raw,
            "Failed to decode response"
        );
        Error::Decode {
            raw_response: raw.to_string(),
            serde_error: e.to_string(),
            status,
        }
    })
}

/// One concrete shape of a discriminated union.
pub trait Variant: DeserializeOwned {
    /// The discriminator value that selects this shape.
    const TAG: &'static str;
}

/// A decoded payload whose shape is selected by a discriminator field.
///
/// # Examples
///
/// ```
/// use palaver::decode::{Discriminated, Variant};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Running {
///     title: String,
/// }
///
/// impl Variant for Running {
///     const TAG: &'static str = "running";
/// }
///
/// let payload = Discriminated::from_str("status", r#"{"status":"running","title":"grep"}"#).unwrap();
/// assert_eq!(payload.tag(), Some("running"));
/// assert_eq!(payload.variant::<Running>().unwrap().title, "grep");
///
/// let payload = Discriminated::from_str("status", r#"{"status":"running"}"#).unwrap();
/// assert!(payload.variant::<Running>().is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminated {
    field: &'static str,
    tag: Option<String>,
    raw: Value,
}

impl Discriminated {
    /// Wraps an already-parsed JSON value.
    ///
    /// Never fails: a non-object, a missing field or a non-string tag yields an
    /// untagged payload.
    pub fn from_value(field: &'static str, raw: Value) -> Self {
        let tag = raw
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string);
        Self { field, tag, raw }
    }

    /// Parses `raw` as JSON and wraps it.
    ///
    /// # Errors
    ///
    /// Fails only if `raw` is not JSON at all.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(field: &'static str, raw: &str) -> Result<Self, serde_json::Error> {
        let value = serde_json::from_str(raw)?;
        Ok(Self::from_value(field, value))
    }

    /// The name of the discriminator field.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The discriminator value, if present and a string.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The full payload as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Consumes the wrapper, returning the full payload.
    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// Returns `true` if the tag selects `V` and the payload is a complete `V`.
    pub fn is<V: Variant>(&self) -> bool {
        self.variant::<V>().is_some()
    }

    /// Decodes the payload as `V` if the tag selects it and every field of `V` is valid.
    ///
    /// Each call decodes independently from the raw payload.
    pub fn variant<V: Variant>(&self) -> Option<V> {
        if self.tag.as_deref() != Some(V::TAG) {
            return None;
        }
        match V::deserialize(&self.raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(
                    field = self.field,
                    tag = V::TAG,
                    error = %e,
                    "Tag matched but payload is not a complete variant"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Session {
        id: String,
        title: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Text {
        text: String,
    }

    impl Variant for Text {
        const TAG: &'static str = "text";
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct File {
        url: String,
        mime: String,
    }

    impl Variant for File {
        const TAG: &'static str = "file";
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let session: Session = decode_body(
            r#"{"id":"ses_1","title":"t","version":"0.9","extra":{"a":1}}"#,
            StatusCode::OK,
        )
        .unwrap();
        assert_eq!(session.id, "ses_1");
    }

    #[test]
    fn test_missing_field_is_named() {
        let err = decode_body::<Session>(r#"{"id":"ses_1"}"#, StatusCode::OK).unwrap_err();
        match err {
            Error::Decode {
                serde_error,
                raw_response,
                status,
            } => {
                assert!(serde_error.contains("title"), "{}", serde_error);
                assert_eq!(raw_response, r#"{"id":"ses_1"}"#);
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("expected Decode, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_body_reads_as_null() {
        decode_body::<()>("", StatusCode::NO_CONTENT).unwrap();
        let value: Option<Session> = decode_body("  ", StatusCode::OK).unwrap();
        assert!(value.is_none());
        assert!(decode_body::<Session>("", StatusCode::OK).is_err());
    }

    #[test]
    fn test_variant_requires_tag_and_shape() {
        let payload = Discriminated::from_str("type", r#"{"type":"text","text":"hi"}"#).unwrap();
        assert_eq!(payload.variant::<Text>(), Some(Text { text: "hi".into() }));
        assert!(!payload.is::<File>());

        // right tag, incomplete shape
        let payload = Discriminated::from_str("type", r#"{"type":"file","url":"x"}"#).unwrap();
        assert!(!payload.is::<File>());

        // complete shape, wrong tag
        let payload = Discriminated::from_str("type", r#"{"type":"text","url":"x","mime":"m"}"#)
            .unwrap();
        assert!(!payload.is::<File>());
    }

    #[test]
    fn test_untagged_payloads_decode() {
        for raw in [r#"{}"#, r#"{"type":"patch"}"#, r#"{"type":5}"#, "[]", "null"] {
            let payload = Discriminated::from_str("type", raw).unwrap();
            assert!(!payload.is::<Text>());
            assert!(!payload.is::<File>());
        }
        assert_eq!(
            Discriminated::from_str("type", r#"{"type":"patch"}"#)
                .unwrap()
                .tag(),
            Some("patch")
        );
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(Discriminated::from_str("type", "not json").is_err());
    }
}
