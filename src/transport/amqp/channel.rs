use super::super::json::JsonDelivery;
use super::super::{
    ExchangeDescriptor, ExchangeKind, MessageChannel, PublishProperties, QueueDescriptor,
    RawDelivery,
};
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicGetOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection};
use log::info;

/// How many unacknowledged push-deliveries the broker may hold against a
/// channel. Pull-based retrieval is unaffected, but a larger credit would
/// silently throttle other consumers sharing the channel.
const DELIVERY_CREDIT: u16 = 1;

/// Creates a channel on the given connection and asserts the exchange
///
/// The channel's delivery credit (prefetch) is fixed to 1. Asserting an
/// exchange that already exists with the same parameters is a no-op;
/// conflicting parameters are a broker-level error surfaced to the caller
/// unchanged.
pub async fn open_channel(
    connection: &Connection,
    exchange: &ExchangeDescriptor,
) -> Result<AmqpChannel, lapin::Error> {
    let channel = connection.create_channel().await?;
    channel
        .basic_qos(DELIVERY_CREDIT, BasicQosOptions::default())
        .await?;

    info!("Broker channel created");

    channel
        .exchange_declare(
            exchange.name(),
            amqp_exchange_kind(exchange.kind()),
            ExchangeDeclareOptions {
                durable: exchange.durable(),
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    info!("Exchange {} asserted", exchange.name());

    Ok(AmqpChannel {
        channel,
        exchange: exchange.name().to_owned(),
    })
}

fn amqp_exchange_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        ExchangeKind::Headers => lapin::ExchangeKind::Headers,
    }
}

fn amqp_properties(properties: &PublishProperties) -> BasicProperties {
    let mut amqp = BasicProperties::default();

    if let Some(id) = properties.correlation_id() {
        amqp = amqp.with_correlation_id(id.as_str().to_owned().into());
    }

    if let Some(queue) = properties.reply_to() {
        amqp = amqp.with_reply_to(queue.to_owned().into());
    }

    amqp
}

/// Channel bound to one broker connection, configured with a delivery credit of 1
#[derive(Clone)]
pub struct AmqpChannel {
    channel: Channel,
    exchange: String,
}

impl AmqpChannel {
    /// Name of the exchange this channel publishes through
    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}

#[async_trait]
impl MessageChannel for AmqpChannel {
    type Delivery = AmqpDelivery;

    async fn publish(
        &self,
        routing_key: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> EmptyResult {
        // The returned confirmation is not awaited: without publisher
        // confirms enabled it resolves immediately and a broker-side drop
        // stays invisible to the caller.
        self.channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                amqp_properties(&properties),
            )
            .await?;

        Ok(())
    }

    async fn send_to_queue(
        &self,
        queue: &str,
        payload: &[u8],
        properties: PublishProperties,
    ) -> EmptyResult {
        // Publishing through the default exchange routes straight to the
        // queue named by the routing key.
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                amqp_properties(&properties),
            )
            .await?;

        Ok(())
    }

    async fn assert_queue(&self, descriptor: &QueueDescriptor) -> EmptyResult {
        let mut arguments = FieldTable::default();

        if let Some(idle_expiry) = descriptor.idle_expiry() {
            arguments.insert(
                "x-expires".into(),
                AMQPValue::LongUInt(idle_expiry.as_millis() as u32),
            );
        }

        self.channel
            .queue_declare(
                descriptor.name(),
                QueueDeclareOptions {
                    exclusive: descriptor.exclusive(),
                    ..Default::default()
                },
                arguments,
            )
            .await?;

        Ok(())
    }

    async fn bind_queue(&self, queue: &str, routing_key: &str) -> EmptyResult {
        self.channel
            .queue_bind(
                queue,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(())
    }

    async fn delete_queue(&self, queue: &str) -> EmptyResult {
        self.channel
            .queue_delete(queue, QueueDeleteOptions::default())
            .await?;

        Ok(())
    }

    async fn try_pull(&self, queue: &str) -> Result<Option<Self::Delivery>, BoxedError> {
        let message = self
            .channel
            .basic_get(queue, BasicGetOptions { no_ack: false })
            .await?;

        Ok(message.map(|message| AmqpDelivery {
            delivery: message.delivery,
        }))
    }

    async fn subscribe(
        &self,
        queue: &str,
    ) -> Result<BoxStream<'static, Result<Self::Delivery, BoxedError>>, BoxedError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let stream = consumer
            .map(|result| {
                result
                    .map(|delivery| AmqpDelivery { delivery })
                    .map_err(Into::into)
            })
            .boxed();

        Ok(stream)
    }
}

/// Message pulled from a queue through the AMQP binding
pub struct AmqpDelivery {
    delivery: lapin::message::Delivery,
}

#[async_trait]
impl RawDelivery for AmqpDelivery {
    fn payload(&self) -> &[u8] {
        &self.delivery.data
    }

    fn correlation_id(&self) -> Option<&str> {
        self.delivery
            .properties
            .correlation_id()
            .as_ref()
            .map(|id| id.as_str())
    }

    fn reply_to(&self) -> Option<&str> {
        self.delivery
            .properties
            .reply_to()
            .as_ref()
            .map(|queue| queue.as_str())
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.delivery.ack(BasicAckOptions::default()).await?;

        Ok(())
    }
}

impl JsonDelivery for AmqpDelivery {}
