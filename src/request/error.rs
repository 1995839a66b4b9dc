use crate::BoxedError;
use thiserror::Error;

/// Error type for sending envelopes
#[derive(Error, Debug)]
pub enum PublishError {
    /// The envelope could not be serialized into its wire format
    #[error("envelope could not be serialized")]
    SerializationFailed(#[source] BoxedError),
    /// The reply queue could not be prepared before sending
    #[error("unable to prepare reply queue")]
    ReplyQueueUnavailable(#[source] BoxedError),
    /// Handing the message to the transport failed
    #[error("sending of message failed")]
    SendingFailure(#[source] BoxedError),
}

/// Error type for retrieving correlated replies
#[derive(Error, Debug)]
pub enum FetchError {
    /// No reply carrying the requested correlation id arrived within the
    /// deadline. Explicitly distinct from a legitimate reply with an empty
    /// payload.
    #[error("no matching reply arrived within the deadline")]
    TimedOut,
    /// Pulling a message from the reply queue failed
    #[error("pulling from the reply queue failed")]
    PullFailed(#[source] BoxedError),
    /// A message could not be acknowledged
    #[error("acknowledging a message failed")]
    AcknowledgeFailed(#[source] BoxedError),
    /// An unrelated message could not be returned to the queue
    #[error("requeueing an unrelated message failed")]
    RequeueFailed(#[source] BoxedError),
    /// The matched reply body was not a valid envelope
    #[error("matched reply could not be decoded")]
    DecodeFailed(#[source] BoxedError),
    /// The dispatcher consuming the shared queue terminated
    #[error("reply dispatcher terminated before a reply arrived")]
    DispatcherStopped,
}
