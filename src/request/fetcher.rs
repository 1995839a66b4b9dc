use super::{FetchError, QueueLifecycle, ReplyTicket};
use crate::correlation::CorrelationId;
use crate::envelope::Envelope;
use crate::transport::{Delivery, MessageChannel, PublishProperties, RawDelivery};
use log::warn;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Deadline for [`fetch`](Fetcher::fetch) when a caller has no specific one
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Retrieves the reply matching a [`ReplyTicket`] from its queue
///
/// The queue may hold replies belonging to other outstanding tickets, so the
/// fetcher scans it: messages are pulled one at a time, a mismatch is
/// rotated to the back of the queue for its rightful owner and the scan
/// continues until the wanted correlation id turns up or the deadline fires.
/// Under N concurrently outstanding tickets on one queue this degrades
/// toward O(N) broker round-trips per fetch.
///
/// [`fetch`](Fetcher::fetch) takes `&mut self`: a channel is not safe for
/// interleaved operations from multiple logical callers, so poll loops of
/// tickets sharing a fetcher are serialized by the borrow. For a
/// subscription-based alternative on shared queues see
/// [`ReplyDispatcher`](super::ReplyDispatcher).
pub struct Fetcher<C: MessageChannel> {
    channel: C,
    poll_interval: Duration,
}

impl<C: MessageChannel> Fetcher<C> {
    /// Creates a fetcher with the default interval between empty polls
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the interval slept after polling an empty queue
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Polls the ticket's queue until its reply arrives or the timeout fires
    ///
    /// On every exit path a queue with the
    /// [`DeleteAfterFetch`](QueueLifecycle::DeleteAfterFetch) lifecycle is
    /// deleted afterwards; a failure to delete is logged and never masks the
    /// fetch outcome. A deadline that elapses without a match yields
    /// [`FetchError::TimedOut`].
    pub async fn fetch(
        &mut self,
        ticket: &ReplyTicket,
        timeout: Duration,
    ) -> Result<Envelope, FetchError> {
        let deadline = Instant::now() + timeout;
        let outcome = self.poll(ticket, deadline).await;

        if ticket.lifecycle() == QueueLifecycle::DeleteAfterFetch {
            if let Err(error) = self.channel.delete_queue(ticket.queue()).await {
                warn!("Failed to delete reply queue {}: {}", ticket.queue(), error);
            }
        }

        outcome
    }

    async fn poll(
        &mut self,
        ticket: &ReplyTicket,
        deadline: Instant,
    ) -> Result<Envelope, FetchError> {
        while Instant::now() < deadline {
            let delivery = self
                .channel
                .try_pull(ticket.queue())
                .await
                .map_err(FetchError::PullFailed)?;

            let mut delivery = match delivery {
                Some(delivery) => delivery,
                None => {
                    sleep(self.poll_interval).await;
                    continue;
                }
            };

            if delivery.correlation_id() == Some(ticket.correlation_id().as_str()) {
                delivery
                    .acknowledge()
                    .await
                    .map_err(FetchError::AcknowledgeFailed)?;

                return delivery
                    .parse_payload::<Envelope>()
                    .map_err(FetchError::DecodeFailed);
            }

            // Somebody else's reply: rotate it to the back of the queue as
            // delete+reinsert, keeping its correlation id intact. Not atomic;
            // a crash between the two operations loses the message.
            let payload = delivery.payload().to_vec();
            let properties = match delivery.correlation_id() {
                Some(id) => {
                    PublishProperties::default().with_correlation_id(CorrelationId::from(id))
                }
                None => PublishProperties::default(),
            };

            delivery
                .acknowledge()
                .await
                .map_err(FetchError::AcknowledgeFailed)?;

            self.channel
                .send_to_queue(ticket.queue(), &payload, properties)
                .await
                .map_err(FetchError::RequeueFailed)?;
        }

        Err(FetchError::TimedOut)
    }
}
