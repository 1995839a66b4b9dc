use super::{PublishError, ReplyPolicy, ReplyTicket};
use crate::correlation::CorrelationId;
use crate::envelope::Envelope;
use crate::transport::{MessageChannel, PublishProperties};
use log::debug;

/// Sends envelopes through the channel's exchange
///
/// Two modes: [`publish`](Publisher::publish) is fire-and-forget,
/// [`publish_with_reply`](Publisher::publish_with_reply) additionally
/// attaches a fresh correlation id and a reply destination determined by the
/// configured [`ReplyPolicy`].
pub struct Publisher<C: MessageChannel> {
    channel: C,
    reply_policy: ReplyPolicy,
}

impl<C: MessageChannel> Publisher<C> {
    /// Creates a publisher using the default private reply queue policy
    pub fn new(channel: C) -> Self {
        Self::with_reply_policy(channel, ReplyPolicy::default())
    }

    /// Creates a publisher with an explicit reply-target policy
    pub fn with_reply_policy(channel: C, reply_policy: ReplyPolicy) -> Self {
        Self {
            channel,
            reply_policy,
        }
    }

    /// Reply-target policy of this publisher
    pub fn reply_policy(&self) -> &ReplyPolicy {
        &self.reply_policy
    }

    /// Sends an envelope with no reply expected
    ///
    /// Fire-and-forget: no broker confirmation is awaited, so a broker-side
    /// drop is not observed by the caller.
    pub async fn publish(&self, routing_key: &str, envelope: &Envelope) -> Result<(), PublishError> {
        let data = serialize(envelope)?;

        self.channel
            .publish(routing_key, data.as_bytes(), PublishProperties::default())
            .await
            .map_err(PublishError::SendingFailure)?;

        debug!("Sent data to {}", routing_key);

        Ok(())
    }

    /// Sends an envelope expecting a correlated reply
    ///
    /// Generates a fresh correlation id, establishes the reply target
    /// through the configured policy and publishes the envelope tagged with
    /// both. The returned ticket is what a [`Fetcher`](super::Fetcher)
    /// redeems for the reply.
    pub async fn publish_with_reply(
        &self,
        routing_key: &str,
        envelope: &Envelope,
    ) -> Result<ReplyTicket, PublishError> {
        let correlation_id = CorrelationId::generate();
        let ticket = self
            .reply_policy
            .prepare(&self.channel, correlation_id)
            .await
            .map_err(PublishError::ReplyQueueUnavailable)?;

        let data = serialize(envelope)?;
        let properties = PublishProperties::default()
            .with_correlation_id(ticket.correlation_id().clone())
            .with_reply_to(ticket.queue());

        self.channel
            .publish(routing_key, data.as_bytes(), properties)
            .await
            .map_err(PublishError::SendingFailure)?;

        debug!("Sent data to {}", routing_key);

        Ok(ticket)
    }
}

pub(super) fn serialize(envelope: &Envelope) -> Result<String, PublishError> {
    serde_json::to_string(envelope).map_err(|e| PublishError::SerializationFailed(e.into()))
}
