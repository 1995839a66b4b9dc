use crate::correlation::CorrelationId;
use crate::transport::{MessageChannel, QueueDescriptor};
use crate::{BoxedError, EmptyResult};
use std::time::Duration;

/// Idle period after which the broker removes an abandoned private reply queue
pub const DEFAULT_REPLY_QUEUE_EXPIRY: Duration = Duration::from_secs(10);

/// How a reply queue outlives a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLifecycle {
    /// The queue exists for this ticket alone and is deleted once the
    /// exchange concludes, successfully or not
    DeleteAfterFetch,
    /// The queue is shared with other tickets and must outlive every one of
    /// them; it is never deleted by this crate
    Retain,
}

/// Where replies should land, unified over both deployment variants
///
/// Both variants fulfil the same contract; they only differ in queue
/// lifecycle. The policy is selected once at configuration time and the
/// poll/requeue machinery is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPolicy {
    /// A private, exclusive queue per request, named after its correlation
    /// id and expiring on its own after idling
    PrivateQueue {
        /// Idle period after which the broker removes an abandoned queue
        idle_expiry: Duration,
    },
    /// One long-lived, well-known queue shared by every ticket of this
    /// process; replies are told apart solely by correlation id
    SharedQueue {
        /// Externally configured queue name, fixed for the process lifetime
        name: String,
    },
}

impl Default for ReplyPolicy {
    /// Private reply queues with the default idle expiry
    fn default() -> Self {
        ReplyPolicy::PrivateQueue {
            idle_expiry: DEFAULT_REPLY_QUEUE_EXPIRY,
        }
    }
}

impl ReplyPolicy {
    /// Establishes the reply target for a fresh correlation id
    ///
    /// For the private variant this asserts the per-request queue; the
    /// shared variant only references the well-known queue (see
    /// [`ensure_queue`](ReplyPolicy::ensure_queue)).
    pub(crate) async fn prepare<C: MessageChannel>(
        &self,
        channel: &C,
        correlation_id: CorrelationId,
    ) -> Result<ReplyTicket, BoxedError> {
        match self {
            ReplyPolicy::PrivateQueue { idle_expiry } => {
                let descriptor =
                    QueueDescriptor::ephemeral(correlation_id.as_str(), *idle_expiry);
                channel.assert_queue(&descriptor).await?;

                Ok(ReplyTicket::new(
                    correlation_id,
                    descriptor.name().to_owned(),
                    QueueLifecycle::DeleteAfterFetch,
                ))
            }
            ReplyPolicy::SharedQueue { name } => Ok(ReplyTicket::new(
                correlation_id,
                name.clone(),
                QueueLifecycle::Retain,
            )),
        }
    }

    /// Asserts the shared reply queue once at startup
    ///
    /// A no-op for the private variant, whose queues are created per
    /// request.
    pub async fn ensure_queue<C: MessageChannel>(&self, channel: &C) -> EmptyResult {
        if let ReplyPolicy::SharedQueue { name } = self {
            channel.assert_queue(&QueueDescriptor::shared(name)).await?;
        }

        Ok(())
    }
}

/// Pairing of a sent request with the location its reply will appear at
///
/// Created by [`Publisher::publish_with_reply`](super::Publisher::publish_with_reply)
/// and consumed by [`Fetcher::fetch`](super::Fetcher::fetch) or a
/// [`ReplyDispatcher`](super::ReplyDispatcher) registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTicket {
    correlation_id: CorrelationId,
    queue: String,
    lifecycle: QueueLifecycle,
}

impl ReplyTicket {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        queue: String,
        lifecycle: QueueLifecycle,
    ) -> Self {
        Self {
            correlation_id,
            queue,
            lifecycle,
        }
    }

    /// Correlation id the reply will be tagged with
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Queue the reply will appear on
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// How the reply queue outlives the fetch
    pub fn lifecycle(&self) -> QueueLifecycle {
        self.lifecycle
    }
}
