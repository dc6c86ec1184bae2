//! Input decoding and field validation for procedures.

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use super::error::{FieldErrors, RpcError};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
pub const MAX_QUERY_LEN: usize = 100;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_IMAGE_URL_LEN: usize = 2048;

/// Inputs check (and normalize) themselves before a handler sees them.
pub trait Validate {
    fn validate(&mut self, v: &mut Validator);
}

/// Collects field errors so one response can report all of them.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) {
        if value < min {
            self.error(field, format!("must be at least {min}"));
        } else if value > max {
            self.error(field, format!("must be at most {max}"));
        }
    }

    /// Trim in place and check the character count.
    pub fn trimmed_len(&mut self, field: &str, value: &mut String, min: usize, max: usize) {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
        let len = value.chars().count();
        if len < min {
            self.error(field, format!("must be at least {min} characters"));
        } else if len > max {
            self.error(field, format!("must be at most {max} characters"));
        }
    }

    pub fn http_url(&mut self, field: &str, value: &str) {
        if value.len() > MAX_IMAGE_URL_LEN {
            self.error(field, format!("must be at most {MAX_IMAGE_URL_LEN} characters"));
            return;
        }
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => self.error(field, "must be an http(s) URL"),
        }
    }

    pub fn uuid(&mut self, field: &str, value: &str) -> Option<Uuid> {
        match Uuid::parse_str(value.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.error(field, "must be a UUID");
                None
            }
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// # Errors
    /// Returns `RpcError::Validation` when any field failed.
    pub fn finish(self) -> Result<(), RpcError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(RpcError::Validation(self.errors))
        }
    }
}

/// Decode and validate a procedure input. A missing or `null` input decodes
/// as an empty object so all-default inputs can be omitted.
///
/// # Errors
/// Returns `BadRequest` for undecodable input and `Validation` for field
/// failures.
pub fn parse_input<T>(input: Value) -> Result<T, RpcError>
where
    T: DeserializeOwned + Validate,
{
    let input = if input.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        input
    };
    let mut parsed: T = serde_json::from_value(input)
        .map_err(|err| RpcError::BadRequest(format!("invalid input: {err}")))?;
    let mut validator = Validator::default();
    parsed.validate(&mut validator);
    validator.finish()?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Probe {
        #[serde(default = "default_limit")]
        limit: i64,
        #[serde(default)]
        name: Option<String>,
    }

    fn default_limit() -> i64 {
        DEFAULT_LIMIT
    }

    impl Validate for Probe {
        fn validate(&mut self, v: &mut Validator) {
            v.range("limit", self.limit, 1, MAX_LIMIT);
            if let Some(name) = self.name.as_mut() {
                v.trimmed_len("name", name, 1, MAX_NAME_LEN);
            }
        }
    }

    #[test]
    fn null_input_uses_defaults() -> Result<(), RpcError> {
        let probe: Probe = parse_input(Value::Null)?;
        assert_eq!(probe.limit, DEFAULT_LIMIT);
        assert!(probe.name.is_none());
        Ok(())
    }

    #[test]
    fn out_of_range_limit_is_a_field_error() {
        for limit in [0, 101, -5] {
            match parse_input::<Probe>(json!({ "limit": limit })) {
                Err(RpcError::Validation(errors)) => assert!(errors.contains_key("limit")),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn names_are_trimmed_before_length_checks() -> Result<(), RpcError> {
        let probe: Probe = parse_input(json!({ "name": "  Ada  " }))?;
        assert_eq!(probe.name.as_deref(), Some("Ada"));
        assert!(matches!(
            parse_input::<Probe>(json!({ "name": "   " })),
            Err(RpcError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            parse_input::<Probe>(json!({ "email": "x" })),
            Err(RpcError::BadRequest(_))
        ));
    }

    #[test]
    fn url_and_uuid_checks() {
        let mut v = Validator::default();
        v.http_url("image", "https://example.com/a.png");
        assert!(v.uuid("id", &Uuid::new_v4().to_string()).is_some());
        assert!(v.is_valid());

        v.http_url("image", "javascript:alert(1)");
        v.http_url("image", &format!("https://example.com/{}", "a".repeat(MAX_IMAGE_URL_LEN)));
        assert!(v.uuid("id", "not-a-uuid").is_none());
        match v.finish() {
            Err(RpcError::Validation(errors)) => {
                assert_eq!(errors.get("image").map(Vec::len), Some(2));
                assert!(errors.contains_key("id"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
