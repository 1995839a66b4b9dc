//! Message payload model exchanged between services
//!
//! An [`Envelope`] is the only payload shape that travels through the
//! exchange. It carries a protocol status code, a free-form message kind, an
//! arbitrary structured payload and a locale tag. Error envelopes are a
//! canned shape on top of this with a well-known payload structure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message payload exchanged between parties
///
/// Immutable once constructed; serialized to UTF-8 JSON for transport and
/// deserialized back on receipt. The transport metadata (correlation id,
/// reply destination) lives outside of this structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Protocol status code (HTTP-style)
    pub status: u16,
    /// Free-form message kind (e.g. `"Error"`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Arbitrary structured payload
    pub payload: Value,
    /// Locale tag for human readable content
    pub language: String,
}

impl Default for Envelope {
    /// An envelope with nothing but the fixed defaults filled in
    fn default() -> Self {
        Self {
            status: 500,
            kind: String::new(),
            payload: Value::Object(serde_json::Map::new()),
            language: String::from("en"),
        }
    }
}

impl Envelope {
    /// Creates a new envelope from raw parts
    pub fn new(
        payload: Value,
        kind: impl Into<String>,
        status: u16,
        language: impl Into<String>,
    ) -> Self {
        Self {
            status,
            kind: kind.into(),
            payload,
            language: language.into(),
        }
    }

    /// Creates an error envelope with a well-known payload shape
    ///
    /// The payload contains the given message and, only when present, the
    /// more specific error details. See [`ErrorPayload`] for the
    /// deserialization counterpart.
    pub fn error(
        message: impl Into<String>,
        status: u16,
        errors: Option<Value>,
        language: impl Into<String>,
    ) -> Self {
        let mut payload = serde_json::Map::new();
        payload.insert("message".into(), Value::String(message.into()));

        if let Some(errors) = errors {
            payload.insert("errors".into(), errors);
        }

        Self::new(Value::Object(payload), "Error", status, language)
    }
}

/// Structured payload carried by error envelopes
///
/// Invariant of the protocol: the payload of an envelope with kind `"Error"`
/// always contains a `message` and may contain field level `errors`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    /// Main human readable message for the error
    pub message: String,
    /// More specific, usually field level error details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

/// Terminal failure of an exchange as reported to an HTTP boundary
///
/// Instead of testing the runtime type of an arbitrary error value, the
/// boundary hands a tagged variant to the rendering collaborator which then
/// switches on it.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeFailure {
    /// A well-formed envelope travelled back; rendered with its own status
    Envelope(Envelope),
    /// Any other value; rendered verbatim as a client error
    Other(Value),
}

impl ExchangeFailure {
    /// Status code the rendering collaborator writes
    pub fn status(&self) -> u16 {
        match self {
            ExchangeFailure::Envelope(envelope) => envelope.status,
            ExchangeFailure::Other(_) => 400,
        }
    }

    /// Body the rendering collaborator writes
    pub fn body(&self) -> &Value {
        match self {
            ExchangeFailure::Envelope(envelope) => &envelope.payload,
            ExchangeFailure::Other(value) => value,
        }
    }
}

impl From<Envelope> for ExchangeFailure {
    fn from(envelope: Envelope) -> Self {
        ExchangeFailure::Envelope(envelope)
    }
}

impl From<Value> for ExchangeFailure {
    fn from(value: Value) -> Self {
        ExchangeFailure::Other(value)
    }
}

/// One-shot sink an HTTP collaborator exposes for rendering an error
pub trait ResponseSink {
    /// Writes a status code and JSON body to the underlying response
    fn write(&mut self, status: u16, body: &Value);
}

/// Renders an exchange failure into the given sink
pub fn render_http_error<S: ResponseSink>(sink: &mut S, failure: &ExchangeFailure) {
    sink.write(failure.status(), failure.body());
}
