//! Parsing and validation of start requests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    config::CaptureConfig,
    resolver::MethodDescription,
    utils::{format_duration, parse_duration},
    Error, Result,
};

/// A start request exactly as it travels over the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    /// Methods to instrument
    #[serde(default)]
    pub methods: Vec<MethodDescription>,
    /// ISO-8601 session length; the configured default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl RequestPayload {
    /// Builds a payload for `methods` lasting `duration`.
    #[must_use]
    pub fn new(methods: Vec<MethodDescription>, duration: Option<Duration>) -> Self {
        RequestPayload {
            methods,
            duration: duration.map(format_duration),
        }
    }
}

/// A validated start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Methods to instrument, never empty
    pub methods: Vec<MethodDescription>,
    /// Session length, never zero
    pub duration: Duration,
}

impl CaptureRequest {
    /// Parses and validates a JSON request.
    ///
    /// # Errors
    /// Returns [`Error::Json`] for malformed JSON and [`Error::InvalidRequest`] if validation
    /// fails.
    pub fn from_json(json: &str, config: &CaptureConfig) -> Result<Self> {
        Self::from_payload(serde_json::from_str(json)?, config)
    }

    /// Validates a decoded payload.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRequest`] if the method list is empty, the duration does not
    /// parse, is zero, or exceeds [`CaptureConfig::max_duration`].
    pub fn from_payload(payload: RequestPayload, config: &CaptureConfig) -> Result<Self> {
        if payload.methods.is_empty() {
            return Err(Error::InvalidRequest("no methods requested".into()));
        }

        let duration = match payload.duration.as_deref() {
            Some(text) => parse_duration(text)?,
            None => config.default_duration,
        };
        if duration.is_zero() {
            return Err(Error::InvalidRequest("duration must be positive".into()));
        }
        if let Some(max) = config.max_duration {
            if duration > max {
                return Err(Error::InvalidRequest(format!(
                    "duration {} exceeds the maximum of {}",
                    format_duration(duration),
                    format_duration(max)
                )));
            }
        }

        Ok(CaptureRequest {
            methods: payload.methods,
            duration,
        })
    }

    /// Converts back to the wire shape.
    #[must_use]
    pub fn to_payload(&self) -> RequestPayload {
        RequestPayload::new(self.methods.clone(), Some(self.duration))
    }
}
