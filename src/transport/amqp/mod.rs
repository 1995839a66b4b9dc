//! Channel capability implementation using [`lapin`](::lapin)
//!
//! The binding stays deliberately thin: connection handshake, framing and
//! TLS are entirely lapin's business, errors bubble up unchanged and no
//! retry of any kind happens here. Robustness is the caller's
//! responsibility.

mod channel;
mod connection;

pub use channel::*;
pub use connection::*;
