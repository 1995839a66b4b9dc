use super::publisher::serialize;
use super::PublishError;
use crate::correlation::CorrelationId;
use crate::envelope::Envelope;
use crate::transport::{MessageChannel, PublishProperties};
use log::debug;

/// Answers a specific request on behalf of the receiving side
///
/// Responses bypass exchange routing and go straight to the queue the
/// request named as its reply destination, tagged with the request's
/// correlation id. Delivery is not acknowledged by the broker.
pub struct Responder<C: MessageChannel> {
    channel: C,
}

impl<C: MessageChannel> Responder<C> {
    /// Creates a responder on top of the given channel
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Sends an envelope to the named queue under the given correlation id
    pub async fn respond(
        &self,
        queue: &str,
        correlation_id: &CorrelationId,
        envelope: &Envelope,
    ) -> Result<(), PublishError> {
        let data = serialize(envelope)?;
        let properties = PublishProperties::default().with_correlation_id(correlation_id.clone());

        self.channel
            .send_to_queue(queue, data.as_bytes(), properties)
            .await
            .map_err(PublishError::SendingFailure)?;

        debug!("Answered to queue {}", queue);

        Ok(())
    }
}
