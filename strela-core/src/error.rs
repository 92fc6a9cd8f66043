use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Possible errors when building a request
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to build a request.
    #[error("failed to build request: {0}")]
    BuildRequest(#[source] http::Error),

    /// Failed to serialize body.
    #[error("failed to serialize body: {0}")]
    SerializeBody(#[source] serde_json::Error),

    /// Failed to validate request.
    #[error("failed to validate request: {0}")]
    RequestValidation(String),
}

/// Reason attached to the synthetic [`ErrorResponse`] emitted for watch records
/// whose envelope parsed but whose object did not decode
pub const MALFORMED_OBJECT: &str = "MalformedObject";

/// A `Status` object the api server answered a failed call with
#[derive(Error, Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[error("{message}: {reason}")]
pub struct ErrorResponse {
    /// Usually `Failure`
    pub status: String,
    /// Human readable description
    #[serde(default)]
    pub message: String,
    /// Machine readable cause such as `NotFound` or `AlreadyExists`
    #[serde(default)]
    pub reason: String,
    /// Http status; 0 for errors synthesized on the client
    pub code: u16,
    /// What the failure refers to
    #[serde(default)]
    pub details: Option<StatusDetails>,
}

impl ErrorResponse {
    /// Synthetic error for a watch object that failed to decode
    pub fn malformed_object(err: &serde_json::Error) -> Self {
        Self {
            status: "Failure".into(),
            message: format!("failed to decode watch object: {err}"),
            reason: MALFORMED_OBJECT.into(),
            code: 0,
            details: None,
        }
    }

    /// Whether this error came from a record that could not be decoded
    pub fn is_malformed_object(&self) -> bool {
        self.code == 0 && self.reason == MALFORMED_OBJECT
    }

    /// Whether the resource version this error refers to has been compacted away
    ///
    /// Servers report this as a 410, but some only set the `Expired` or `Gone` reason.
    pub fn is_expired(&self) -> bool {
        self.code == 410 || self.reason == "Expired" || self.reason == "Gone"
    }
}

/// Optional details of an [`ErrorResponse`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusDetails {
    /// Individual problems, e.g. one per invalid field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causes: Option<Vec<StatusCause>>,
    /// Group of the object concerned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Kind of the object concerned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Name of the object concerned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Suggested wait before a retry, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i32>,
    /// Uid of the object concerned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// One problem listed in [`StatusDetails::causes`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCause {
    /// Json path of the offending field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Human readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine readable cause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFLICT: &str = r#"
    {
      "kind": "Status",
      "apiVersion": "v1",
      "metadata": {},
      "status": "Failure",
      "message": "Operation cannot be fulfilled on minecraftservers.strela.dev \"lobby-0\": the object has been modified",
      "reason": "Conflict",
      "details": {
        "name": "lobby-0",
        "group": "strela.dev",
        "kind": "minecraftservers",
        "causes": [
          { "reason": "FieldValueInvalid", "message": "stale", "field": "metadata.resourceVersion" }
        ]
      },
      "code": 409
    }
    "#;

    #[test]
    fn parses_status_objects() {
        let err: ErrorResponse = serde_json::from_str(CONFLICT).unwrap();
        assert_eq!(err.code, 409);
        assert_eq!(err.reason, "Conflict");
        let details = err.details.unwrap();
        assert_eq!(details.name.as_deref(), Some("lobby-0"));
        assert_eq!(details.causes.unwrap()[0].field.as_deref(), Some("metadata.resourceVersion"));
    }

    #[test]
    fn expiry_is_detected_by_code_or_reason() {
        let gone: ErrorResponse = serde_json::from_value(serde_json::json!({
            "status": "Failure", "message": "too old resource version", "reason": "Expired", "code": 500
        }))
        .unwrap();
        assert!(gone.is_expired());
        let by_code = ErrorResponse {
            code: 410,
            reason: String::new(),
            ..gone.clone()
        };
        assert!(by_code.is_expired());
        let other = ErrorResponse {
            code: 500,
            reason: "InternalError".into(),
            ..gone
        };
        assert!(!other.is_expired());
    }

    #[test]
    fn malformed_objects_are_marked() {
        let err = serde_json::from_str::<u8>("\"x\"").unwrap_err();
        let resp = ErrorResponse::malformed_object(&err);
        assert!(resp.is_malformed_object());
        assert!(!resp.is_expired());
    }
}
