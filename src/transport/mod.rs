//! Opaque broker capabilities the request/reply layer is written against
//!
//! The broker transport itself (connection handshake, wire protocol, TLS) is
//! an external concern. This module defines the small capability surface the
//! protocol logic consumes: a [`MessageChannel`] through which payloads are
//! published, pulled and acknowledged, and the descriptors for the broker
//! side resources it touches.
//!
//! Implementations translate these capabilities onto a concrete client. The
//! [`amqp`] module binds them to [`lapin`](::lapin); the test suite runs the
//! very same protocol logic against an in-process broker.
//!
//! Traits come in a raw and a typed layer: [`RawDelivery`] hands out payload
//! bytes, [`Delivery`] adds parsing on top and is provided for free through
//! the [`json`] marker traits.

pub mod amqp;
pub mod json;

#[cfg(test)]
pub mod memory;

use crate::correlation::CorrelationId;
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use std::time::Duration;

/// Routing strategy of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Routes to queues bound with the exact routing key of the message
    Direct,
    /// Routes to every bound queue, ignoring the routing key
    Fanout,
    /// Routes by pattern-matching the routing key
    Topic,
    /// Routes by matching message headers
    Headers,
}

impl Default for ExchangeKind {
    fn default() -> Self {
        ExchangeKind::Direct
    }
}

/// Describes an exchange and its parameters
///
/// Exchanges are created lazily (assert-if-absent), shared process-wide and
/// never deleted by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDescriptor {
    name: String,
    kind: ExchangeKind,
    durable: bool,
}

impl ExchangeDescriptor {
    /// Creates a new instance from raw parts
    pub fn new(name: impl Into<String>, kind: ExchangeKind, durable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            durable,
        }
    }

    /// Non-durable direct exchange, the default routing setup
    pub fn direct(name: impl Into<String>) -> Self {
        Self::new(name, ExchangeKind::Direct, false)
    }

    /// Name under which the exchange is asserted
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routing strategy of the exchange
    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }

    /// Whether the exchange survives a broker restart
    pub fn durable(&self) -> bool {
        self.durable
    }
}

/// Describes a queue and its lifecycle parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDescriptor {
    name: String,
    exclusive: bool,
    idle_expiry: Option<Duration>,
}

impl QueueDescriptor {
    /// Reply queue for a single request: exclusive to the asserting
    /// connection and removed by the broker after the given idle period,
    /// so an abandoned queue cleans up after itself
    pub fn ephemeral(name: impl Into<String>, idle_expiry: Duration) -> Self {
        Self {
            name: name.into(),
            exclusive: true,
            idle_expiry: Some(idle_expiry),
        }
    }

    /// Long-lived queue shared across requests, never expiring on its own
    pub fn shared(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exclusive: false,
            idle_expiry: None,
        }
    }

    /// Name under which the queue is asserted
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the queue is usable only by the connection that created it
    pub fn exclusive(&self) -> bool {
        self.exclusive
    }

    /// Idle period after which the broker removes the queue, if any
    pub fn idle_expiry(&self) -> Option<Duration> {
        self.idle_expiry
    }
}

/// Transport metadata attached to a published message, outside of its body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishProperties {
    correlation_id: Option<CorrelationId>,
    reply_to: Option<String>,
}

impl PublishProperties {
    /// Tags the message with a correlation id
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Names the queue a reply to this message should be sent to
    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }

    /// Correlation id carried by the message, if any
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// Reply destination carried by the message, if any
    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }
}

/// Message pulled from a queue, providing the raw payload and its metadata
///
/// Deliveries are handed out in manual acknowledgment mode: until
/// [`acknowledge`](RawDelivery::acknowledge) is called the broker considers
/// the message in-flight and may redeliver it.
#[async_trait]
pub trait RawDelivery {
    /// Payload bytes of the message body
    fn payload(&self) -> &[u8];

    /// Correlation id carried in the transport metadata, if any
    fn correlation_id(&self) -> Option<&str>;

    /// Reply destination carried in the transport metadata, if any
    fn reply_to(&self) -> Option<&str>;

    /// Acknowledges the message as processed, removing it from the queue
    async fn acknowledge(&mut self) -> EmptyResult;
}

/// Useful functions for [`RawDelivery`] implementations
pub trait Delivery: RawDelivery {
    /// Attempts to parse the wire-format payload into a given data structure
    fn parse_payload<'a, T>(&'a self) -> Result<T, BoxedError>
    where
        T: Deserialize<'a>;
}

/// Communication channel bound to one broker connection and one exchange
///
/// A channel is not safe for concurrently in-flight operations from multiple
/// logical callers; higher layers are responsible for keeping its use
/// strictly sequential (see [`Fetcher`](crate::request::Fetcher)).
#[async_trait]
pub trait MessageChannel {
    /// Type of delivery yielded when pulling from a queue
    type Delivery: Delivery + Send + Sync;

    /// Publishes a payload to the channel's exchange under a routing key
    ///
    /// Fire-and-forget: the call returns once the transport accepted the
    /// message, no broker acknowledgment is awaited.
    async fn publish(
        &self,
        routing_key: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> EmptyResult;

    /// Sends a payload directly to a named queue, bypassing exchange routing
    async fn send_to_queue(
        &self,
        queue: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> EmptyResult;

    /// Creates a queue if it does not exist yet
    ///
    /// Asserting an existing queue with the same parameters is a no-op;
    /// conflicting parameters surface the broker error unchanged.
    async fn assert_queue(&self, descriptor: &QueueDescriptor) -> EmptyResult;

    /// Binds a queue to the channel's exchange under a routing key
    async fn bind_queue(&self, queue: &str, routing_key: &str) -> EmptyResult;

    /// Deletes a queue together with any messages still in it
    async fn delete_queue(&self, queue: &str) -> EmptyResult;

    /// Pulls at most one message without blocking, in manual acknowledgment
    /// mode; `None` when the queue is currently empty
    async fn try_pull(&self, queue: &str) -> Result<Option<Self::Delivery>, BoxedError>;

    /// Subscribes to push-style deliveries from a queue
    async fn subscribe(
        &self,
        queue: &str,
    ) -> Result<BoxStream<'static, Result<Self::Delivery, BoxedError>>, BoxedError>;
}
