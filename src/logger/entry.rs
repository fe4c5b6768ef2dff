use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::{
    cache::InstrumentedMethod,
    logger::ArgumentFormatter,
    probes::ProbeContext,
};

/// Structured context attached to every captured call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureScope {
    /// Time the probe fired
    pub timestamp: DateTime<Utc>,
    /// Defining module of the captured method
    pub module_name: String,
    /// Declaring type of the captured method
    pub type_name: String,
    /// Name of the captured method
    pub method_name: String,
    /// Ambient distributed trace id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Format of `trace_id`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_format: Option<&'static str>,
}

impl CaptureScope {
    /// `timestamp` in ISO-8601 form with millisecond precision.
    #[must_use]
    pub fn timestamp_iso8601(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// One captured call, ready to be written by a [`crate::logger::CaptureSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Method template with positional placeholders
    pub template: Arc<str>,
    /// Rendered values of the supported arguments, in placeholder order
    pub arguments: Vec<String>,
    /// Where and when the call happened
    pub scope: CaptureScope,
}

impl LogEntry {
    /// Creates an entry for a call of `method`.
    #[must_use]
    pub fn new(
        method: &InstrumentedMethod,
        arguments: Vec<String>,
        context: &ProbeContext,
    ) -> Self {
        LogEntry {
            template: Arc::from(method.template.as_str()),
            arguments,
            scope: CaptureScope {
                timestamp: Utc::now(),
                module_name: method.module_name.clone(),
                type_name: method.type_name.clone(),
                method_name: method.method_name.clone(),
                trace_id: context.trace_id.clone(),
                trace_format: context.trace_format.map(<&'static str>::from),
            },
        }
    }

    /// Creates a free-form diagnostic entry.
    #[must_use]
    pub fn diagnostic(message: impl Into<String>) -> Self {
        LogEntry {
            template: Arc::from("{0}"),
            arguments: vec![message.into()],
            scope: CaptureScope {
                timestamp: Utc::now(),
                module_name: String::new(),
                type_name: String::new(),
                method_name: String::new(),
                trace_id: None,
                trace_format: None,
            },
        }
    }

    /// The template with its placeholders substituted.
    #[must_use]
    pub fn message(&self) -> String {
        ArgumentFormatter.render(&self.template, &self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        probes::TraceIdFormat,
        classifier::SignatureClassifier,
        test::factories::{bar_with_ref, resolved},
    };

    #[test]
    fn test_entry_scope_and_message() {
        let method =
            InstrumentedMethod::build(&resolved(1, bar_with_ref()), &SignatureClassifier::new());
        let context = ProbeContext::traced("00-abc-def-01", TraceIdFormat::W3C);

        let entry = LogEntry::new(&method, vec!["5".into()], &context);
        assert_eq!(entry.message(), "Foo.Bar(x: 5, ref y: {unsupported})");
        assert_eq!(entry.scope.module_name, "App.dll");
        assert_eq!(entry.scope.trace_format, Some("W3C"));
        assert!(entry.scope.timestamp_iso8601().ends_with('Z'));
    }

    #[test]
    fn test_diagnostic_entry() {
        let entry = LogEntry::diagnostic("queue {full}");
        assert_eq!(entry.message(), "queue {full}");
    }
}
