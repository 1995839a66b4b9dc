//! Structures to realise a correlated request-reply pattern
//!
//! The broker only knows fire-and-forget delivery, so pairing a reply with
//! its request is entirely this module's job. When talking about the
//! pattern, there are two parties involved:
//!
//! - Requesting side
//! - Responding side
//!
//! On the requesting side, a [`Publisher`] sends an [`Envelope`](crate::envelope::Envelope)
//! through the exchange. In its fire-and-forget mode that is the end of the
//! story; in its reply-expecting mode it additionally stamps the message
//! with a fresh correlation id, establishes where the reply should land (a
//! [`ReplyPolicy`] decides between a private per-request queue and a shared
//! process-wide one) and hands back a [`ReplyTicket`]. The ticket is later
//! redeemed through a [`Fetcher`], which scans the reply queue for the
//! matching correlation id within a deadline while rotating everybody
//! else's replies back onto the queue.
//!
//! On the responding side, a [`Responder`] answers a specific request by
//! sending an envelope straight to the queue the request named, tagged with
//! the request's correlation id.
//!
//! For processes funnelling many concurrent tickets through one shared
//! queue, the [`ReplyDispatcher`] replaces per-ticket scanning with a
//! single consumer task and a dispatch table, trading the O(N) requeue
//! churn for one waiting handle per ticket.
//!
//! Requests may get lost and responses are not acknowledged; nothing in
//! this module retries. Robustness remains the caller's responsibility.

mod dispatcher;
mod error;
mod fetcher;
mod publisher;
mod responder;
mod ticket;

pub use dispatcher::*;
pub use error::*;
pub use fetcher::*;
pub use publisher::*;
pub use responder::*;
pub use ticket::*;
