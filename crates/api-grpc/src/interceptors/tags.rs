//! Tags and fields attached to every latency point.
//!
//! | Kind  | Key          | Present                                          |
//! |-------|--------------|--------------------------------------------------|
//! | tag   | `method`     | always                                           |
//! | tag   | `error_code` | always with `TagPolicy::Always`, else on failure |
//! | tag   | `error`      | on failure with `TagPolicy::ErrorOnly`           |
//!
//! An empty status message is tagged as the code name, since the encoder drops
//! tags with empty values.
//! | field | `latency`    | always, milliseconds as a float                  |

use crate::status::{code_name, outcome_code};
use rpcstats_common::TagPolicy;
use rpcstats_sink::{FieldValue, Fields, Tags};
use std::time::Duration;
use tonic::Status;

pub const METHOD_TAG: &str = "method";
pub const ERROR_CODE_TAG: &str = "error_code";
pub const ERROR_TAG: &str = "error";
pub const LATENCY_FIELD: &str = "latency";

/// Indexed dimensions of one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTags<'a> {
    pub method: &'a str,
    pub error_code: Option<&'static str>,
    pub error: Option<&'a str>,
}

impl<'a> CallTags<'a> {
    /// Derive tags from the call's method and outcome under `policy`.
    pub fn derive(method: &'a str, outcome: Option<&'a Status>, policy: TagPolicy) -> Self {
        let code = code_name(outcome_code(outcome));
        match (policy, outcome) {
            (TagPolicy::Always, _) => Self {
                method,
                error_code: Some(code),
                error: None,
            },
            (TagPolicy::ErrorOnly, Some(status)) => {
                let message = status.message();
                Self {
                    method,
                    error_code: Some(code),
                    error: Some(if message.is_empty() { code } else { message }),
                }
            }
            (TagPolicy::ErrorOnly, None) => Self {
                method,
                error_code: None,
                error: None,
            },
        }
    }

    pub fn into_tags(self) -> Tags {
        let mut tags = Tags::new();
        tags.insert(METHOD_TAG.to_string(), self.method.to_string());
        if let Some(code) = self.error_code {
            tags.insert(ERROR_CODE_TAG.to_string(), code.to_string());
        }
        if let Some(error) = self.error {
            tags.insert(ERROR_TAG.to_string(), error.to_string());
        }
        tags
    }
}

/// Measured payload of one call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallFields {
    pub latency_ms: f64,
}

impl CallFields {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        Self {
            latency_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(LATENCY_FIELD.to_string(), FieldValue::Float(self.latency_ms));
        fields
    }
}
