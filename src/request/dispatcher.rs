use super::FetchError;
use crate::correlation::CorrelationId;
use crate::envelope::Envelope;
use crate::transport::{Delivery, MessageChannel, RawDelivery};
use crate::EmptyResult;
use futures::StreamExt;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

type PendingReplies = HashMap<CorrelationId, oneshot::Sender<Result<Envelope, FetchError>>>;

/// Push-based reply delivery for the shared-queue variant
///
/// One continuously-running consumer task drains the shared reply queue and
/// completes waiting tickets through a dispatch table keyed by correlation
/// id. Compared to scanning the queue per ticket this removes the O(N)
/// requeue cost entirely: every reply is pulled exactly once.
///
/// Replies whose correlation id nobody registered are acknowledged and
/// dropped; they belong to tickets that already gave up.
#[derive(Clone, Default)]
pub struct ReplyDispatcher {
    pending: Arc<Mutex<PendingReplies>>,
}

impl ReplyDispatcher {
    /// Creates a dispatcher with an empty dispatch table
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in a correlation id before the request goes out
    ///
    /// Register first, publish second: a reply can arrive before the
    /// publishing call returns.
    pub fn register(&self, correlation_id: CorrelationId) -> ReplyHandle {
        let (sender, receiver) = oneshot::channel();

        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(correlation_id.clone(), sender);
        }

        ReplyHandle {
            correlation_id,
            receiver,
            pending: self.pending.clone(),
        }
    }

    /// Number of tickets currently waiting for their reply
    pub fn outstanding(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    /// Consumes the shared reply queue, completing registered tickets
    ///
    /// Runs until the subscription ends; intended to be spawned once per
    /// process next to the shared queue's channel. Handles waiting when the
    /// task ends resolve to [`FetchError::DispatcherStopped`].
    pub async fn run<C: MessageChannel>(&self, channel: &C, queue: &str) -> EmptyResult {
        let mut deliveries = channel.subscribe(queue).await?;

        while let Some(delivery) = deliveries.next().await {
            let mut delivery = match delivery {
                Ok(delivery) => delivery,
                Err(error) => {
                    warn!("Failed to receive reply: {}", error);
                    continue;
                }
            };

            let correlation_id = match delivery.correlation_id() {
                Some(id) => CorrelationId::from(id),
                None => {
                    debug!("Dropping reply without correlation id");
                    self.acknowledge(&mut delivery).await;
                    continue;
                }
            };

            let waiting = self
                .pending
                .lock()
                .ok()
                .and_then(|mut pending| pending.remove(&correlation_id));

            match waiting {
                Some(sender) => {
                    let result = delivery
                        .parse_payload::<Envelope>()
                        .map_err(FetchError::DecodeFailed);
                    self.acknowledge(&mut delivery).await;

                    // The ticket may have timed out in the meantime
                    let _ = sender.send(result);
                }
                None => {
                    debug!("Dropping unmatched reply {}", correlation_id);
                    self.acknowledge(&mut delivery).await;
                }
            }
        }

        Ok(())
    }

    async fn acknowledge<D: RawDelivery>(&self, delivery: &mut D) {
        if let Err(error) = delivery.acknowledge().await {
            warn!("Failed to acknowledge reply: {}", error);
        }
    }
}

/// Waiting handle for a single outstanding reply
///
/// Deregisters itself from the dispatch table when dropped, so a timed-out
/// ticket leaves nothing behind.
pub struct ReplyHandle {
    correlation_id: CorrelationId,
    receiver: oneshot::Receiver<Result<Envelope, FetchError>>,
    pending: Arc<Mutex<PendingReplies>>,
}

impl ReplyHandle {
    /// Correlation id this handle is waiting for
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Waits for the matching reply until the timeout fires
    pub async fn wait(mut self, deadline: Duration) -> Result<Envelope, FetchError> {
        match timeout(deadline, &mut self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(FetchError::DispatcherStopped),
            Err(_) => Err(FetchError::TimedOut),
        }
    }
}

impl Drop for ReplyHandle {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.correlation_id);
        }
    }
}
