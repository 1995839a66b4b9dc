//! In-process broker double backing the test suite
//!
//! Implements the full [`MessageChannel`] capability surface against plain
//! in-memory state so the protocol logic can be exercised without a running
//! broker: FIFO queues, direct routing over explicit bindings, manual
//! acknowledgment bookkeeping and the assert-if-absent semantics of resource
//! creation. Routing only implements exact key matching; that is all the
//! tests need.

use super::json::JsonDelivery;
use super::{
    ExchangeDescriptor, ExchangeKind, MessageChannel, PublishProperties, QueueDescriptor,
    RawDelivery,
};
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

const SUBSCRIBE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Errors raised by the in-process broker
#[derive(Error, Debug)]
pub enum MemoryBrokerError {
    /// An exchange was asserted with parameters differing from the existing one
    #[error("exchange {0} already exists with conflicting parameters")]
    ExchangeConflict(String),
    /// A queue was asserted with parameters differing from the existing one
    #[error("queue {0} already exists with conflicting parameters")]
    QueueConflict(String),
    /// An operation referenced a queue that does not exist
    #[error("queue {0} does not exist")]
    UnknownQueue(String),
}

#[derive(Clone)]
struct StoredMessage {
    payload: Vec<u8>,
    properties: PublishProperties,
}

struct QueueState {
    descriptor: QueueDescriptor,
    messages: VecDeque<StoredMessage>,
}

#[derive(PartialEq, Eq)]
struct Binding {
    exchange: String,
    routing_key: String,
    queue: String,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeDescriptor>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    in_flight: usize,
}

/// In-memory broker with FIFO queues and binding-based routing
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    /// Creates an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().expect("broker state poisoned")
    }

    /// Asserts an exchange, failing on conflicting parameters
    pub fn assert_exchange(&self, descriptor: &ExchangeDescriptor) -> EmptyResult {
        let mut state = self.state();

        if let Some(existing) = state.exchanges.get(descriptor.name()) {
            if existing != descriptor {
                return Err(Box::new(MemoryBrokerError::ExchangeConflict(
                    descriptor.name().to_owned(),
                )));
            }

            return Ok(());
        }

        state
            .exchanges
            .insert(descriptor.name().to_owned(), descriptor.clone());

        Ok(())
    }

    /// Opens a channel bound to the given exchange, asserting it first
    pub fn open_channel(&self, exchange: &ExchangeDescriptor) -> Result<MemoryChannel, BoxedError> {
        self.assert_exchange(exchange)?;

        Ok(MemoryChannel {
            broker: self.clone(),
            exchange: exchange.name().to_owned(),
        })
    }

    /// Whether a queue with the given name currently exists
    pub fn queue_exists(&self, queue: &str) -> bool {
        self.state().queues.contains_key(queue)
    }

    /// Number of messages currently sitting in a queue
    pub fn queue_len(&self, queue: &str) -> usize {
        self.state()
            .queues
            .get(queue)
            .map(|state| state.messages.len())
            .unwrap_or_default()
    }

    /// Parameters a queue was asserted with, if it exists
    pub fn queue_descriptor(&self, queue: &str) -> Option<QueueDescriptor> {
        self.state()
            .queues
            .get(queue)
            .map(|state| state.descriptor.clone())
    }

    /// Correlation ids of the messages in a queue, head first
    pub fn correlation_ids(&self, queue: &str) -> Vec<Option<String>> {
        self.state()
            .queues
            .get(queue)
            .map(|state| {
                state
                    .messages
                    .iter()
                    .map(|message| {
                        message
                            .properties
                            .correlation_id()
                            .map(|id| id.as_str().to_owned())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of deliveries pulled but not yet acknowledged
    pub fn in_flight(&self) -> usize {
        self.state().in_flight
    }

    fn settle(&self) {
        let mut state = self.state();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    fn redeliver(&self, queue: &str, message: StoredMessage) {
        let mut state = self.state();
        state.in_flight = state.in_flight.saturating_sub(1);

        if let Some(queue) = state.queues.get_mut(queue) {
            queue.messages.push_front(message);
        }
    }
}

/// Channel view onto a [`MemoryBroker`], bound to one exchange
#[derive(Clone)]
pub struct MemoryChannel {
    broker: MemoryBroker,
    exchange: String,
}

impl MemoryChannel {
    fn deposit(state: &mut BrokerState, queue: &str, message: StoredMessage) {
        if let Some(queue) = state.queues.get_mut(queue) {
            queue.messages.push_back(message);
        }
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    type Delivery = MemoryDelivery;

    async fn publish(
        &self,
        routing_key: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> EmptyResult {
        let mut state = self.broker.state();
        let fanout = state
            .exchanges
            .get(&self.exchange)
            .map(|exchange| exchange.kind() == ExchangeKind::Fanout)
            .unwrap_or(false);

        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|binding| {
                binding.exchange == self.exchange
                    && (fanout || binding.routing_key == routing_key)
            })
            .map(|binding| binding.queue.clone())
            .collect();

        // An unroutable message is dropped, like a broker would without the
        // mandatory flag set.
        for target in targets {
            Self::deposit(
                &mut state,
                &target,
                StoredMessage {
                    payload: payload.to_vec(),
                    properties: properties.clone(),
                },
            );
        }

        Ok(())
    }

    async fn send_to_queue(
        &self,
        queue: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> EmptyResult {
        let mut state = self.broker.state();

        // Default-exchange semantics: a payload addressed to a queue that
        // does not exist vanishes silently.
        Self::deposit(
            &mut state,
            queue,
            StoredMessage {
                payload: payload.to_vec(),
                properties,
            },
        );

        Ok(())
    }

    async fn assert_queue(&self, descriptor: &QueueDescriptor) -> EmptyResult {
        let mut state = self.broker.state();

        if let Some(existing) = state.queues.get(descriptor.name()) {
            if existing.descriptor != *descriptor {
                return Err(Box::new(MemoryBrokerError::QueueConflict(
                    descriptor.name().to_owned(),
                )));
            }

            return Ok(());
        }

        state.queues.insert(
            descriptor.name().to_owned(),
            QueueState {
                descriptor: descriptor.clone(),
                messages: VecDeque::new(),
            },
        );

        Ok(())
    }

    async fn bind_queue(&self, queue: &str, routing_key: &str) -> EmptyResult {
        let mut state = self.broker.state();

        if !state.queues.contains_key(queue) {
            return Err(Box::new(MemoryBrokerError::UnknownQueue(queue.to_owned())));
        }

        let binding = Binding {
            exchange: self.exchange.clone(),
            routing_key: routing_key.to_owned(),
            queue: queue.to_owned(),
        };

        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }

        Ok(())
    }

    async fn delete_queue(&self, queue: &str) -> EmptyResult {
        let mut state = self.broker.state();

        state.queues.remove(queue);
        state.bindings.retain(|binding| binding.queue != queue);

        Ok(())
    }

    async fn try_pull(&self, queue: &str) -> Result<Option<Self::Delivery>, BoxedError> {
        let mut state = self.broker.state();

        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| MemoryBrokerError::UnknownQueue(queue.to_owned()))?;

        let message = match queue_state.messages.pop_front() {
            Some(message) => message,
            None => return Ok(None),
        };

        state.in_flight += 1;

        Ok(Some(MemoryDelivery {
            broker: self.broker.clone(),
            queue: queue.to_owned(),
            payload: message.payload,
            properties: message.properties,
            acked: false,
        }))
    }

    async fn subscribe(
        &self,
        queue: &str,
    ) -> Result<BoxStream<'static, Result<Self::Delivery, BoxedError>>, BoxedError> {
        let channel = self.clone();
        let queue = queue.to_owned();

        let stream = stream::unfold((channel, queue), |(channel, queue)| async move {
            loop {
                match channel.try_pull(&queue).await {
                    Ok(Some(delivery)) => return Some((Ok(delivery), (channel, queue))),
                    Ok(None) => sleep(SUBSCRIBE_POLL_INTERVAL).await,
                    Err(error) => return Some((Err(error), (channel, queue))),
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// Delivery pulled from a [`MemoryBroker`] queue
///
/// Dropping a delivery without acknowledging it returns the message to the
/// head of its queue, mirroring broker redelivery of in-flight messages.
pub struct MemoryDelivery {
    broker: MemoryBroker,
    queue: String,
    payload: Vec<u8>,
    properties: PublishProperties,
    acked: bool,
}

#[async_trait]
impl RawDelivery for MemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn correlation_id(&self) -> Option<&str> {
        self.properties.correlation_id().map(|id| id.as_str())
    }

    fn reply_to(&self) -> Option<&str> {
        self.properties.reply_to()
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.acked = true;
        self.broker.settle();

        Ok(())
    }
}

impl JsonDelivery for MemoryDelivery {}

impl Drop for MemoryDelivery {
    fn drop(&mut self) {
        if !self.acked {
            self.broker.redeliver(
                &self.queue,
                StoredMessage {
                    payload: mem::take(&mut self.payload),
                    properties: self.properties.clone(),
                },
            );
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    fn direct_exchange() -> ExchangeDescriptor {
        ExchangeDescriptor::direct("exchange")
    }

    #[tokio::test]
    async fn assert_exchanges_idempotently() {
        let broker = MemoryBroker::new();

        broker.assert_exchange(&direct_exchange()).unwrap();
        broker.assert_exchange(&direct_exchange()).unwrap();
    }

    #[tokio::test]
    async fn reject_conflicting_exchange_parameters() {
        let broker = MemoryBroker::new();

        broker.assert_exchange(&direct_exchange()).unwrap();

        let conflicting = ExchangeDescriptor::new("exchange", ExchangeKind::Fanout, true);
        assert!(broker.assert_exchange(&conflicting).is_err());
    }

    #[tokio::test]
    async fn route_published_messages_by_binding_in_order() {
        let broker = MemoryBroker::new();
        let channel = broker.open_channel(&direct_exchange()).unwrap();

        channel
            .assert_queue(&QueueDescriptor::shared("work"))
            .await
            .unwrap();
        channel.bind_queue("work", "jobs").await.unwrap();

        channel
            .publish("jobs", b"first", PublishProperties::default())
            .await
            .unwrap();
        channel
            .publish("jobs", b"second", PublishProperties::default())
            .await
            .unwrap();
        channel
            .publish("elsewhere", b"dropped", PublishProperties::default())
            .await
            .unwrap();

        let mut first = channel.try_pull("work").await.unwrap().unwrap();
        assert_eq!(first.payload(), b"first");
        first.acknowledge().await.unwrap();

        let mut second = channel.try_pull("work").await.unwrap().unwrap();
        assert_eq!(second.payload(), b"second");
        second.acknowledge().await.unwrap();

        assert_eq!(broker.queue_len("work"), 0);
        assert_eq!(broker.in_flight(), 0);
    }

    #[tokio::test]
    async fn reject_conflicting_queue_parameters() {
        let broker = MemoryBroker::new();
        let channel = broker.open_channel(&direct_exchange()).unwrap();

        channel
            .assert_queue(&QueueDescriptor::shared("replies"))
            .await
            .unwrap();

        let conflicting = QueueDescriptor::ephemeral("replies", Duration::from_secs(10));
        assert!(channel.assert_queue(&conflicting).await.is_err());
    }

    #[tokio::test]
    async fn redeliver_unacknowledged_messages() {
        let broker = MemoryBroker::new();
        let channel = broker.open_channel(&direct_exchange()).unwrap();

        channel
            .assert_queue(&QueueDescriptor::shared("work"))
            .await
            .unwrap();
        channel
            .send_to_queue("work", b"payload", PublishProperties::default())
            .await
            .unwrap();

        let delivery = channel.try_pull("work").await.unwrap().unwrap();
        assert_eq!(broker.in_flight(), 1);
        drop(delivery);

        assert_eq!(broker.in_flight(), 0);
        assert_eq!(broker.queue_len("work"), 1);
    }

    #[tokio::test]
    async fn recreate_deleted_queues_empty() {
        let broker = MemoryBroker::new();
        let channel = broker.open_channel(&direct_exchange()).unwrap();

        channel
            .assert_queue(&QueueDescriptor::shared("replies"))
            .await
            .unwrap();
        channel
            .send_to_queue("replies", b"leftover", PublishProperties::default())
            .await
            .unwrap();

        channel.delete_queue("replies").await.unwrap();
        assert!(!broker.queue_exists("replies"));

        channel
            .assert_queue(&QueueDescriptor::shared("replies"))
            .await
            .unwrap();
        assert_eq!(broker.queue_len("replies"), 0);
    }
}
