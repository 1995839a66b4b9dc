//! Correlated request/reply on top of a fire-and-forget message broker
//!
//! Message brokers deliver asynchronously, out of order and with no built-in
//! call/response pairing. This crate layers a request/reply protocol on top:
//! every request carries a [`CorrelationId`](correlation::CorrelationId) and a
//! reply destination, the responding side echoes the id on its answer and the
//! requesting side retrieves the matching reply from the destination queue
//! within a deadline.
//!
//! Replies can land in one of two places, unified behind a single
//! [`ReplyPolicy`](request::ReplyPolicy):
//!
//! 1. A private, exclusive queue created per request which expires on its own
//!    when abandoned and is deleted once the exchange concludes.
//! 2. One long-lived queue shared by every outstanding request of a process,
//!    where replies are told apart solely by their correlation id.
//!
//! The [`request`] module contains the protocol logic, the [`transport`]
//! module the opaque broker capabilities it is written against along with an
//! AMQP binding, and [`envelope`] the payload model exchanged between parties.

#![deny(missing_docs)]

pub mod correlation;
pub mod envelope;
pub mod options;
pub mod request;
pub mod transport;

/// Generic error type
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result with no value and a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;
