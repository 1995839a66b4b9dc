//! Options for reaching the message broker
//!
//! Constructed once at startup and handed into the components that need
//! them; nothing in this crate reads the environment on its own. The struct
//! can be flattened into the option set of an embedding service.

use crate::request::ReplyPolicy;
use crate::transport::ExchangeDescriptor;
use structopt::StructOpt;

/// Options for connecting to the message broker
#[derive(Debug, StructOpt)]
pub struct BrokerOptions {
    /// Message broker server URL
    #[structopt(
        long = "broker",
        env = "RABBITMQ_URL",
        default_value = "amqp://localhost",
        value_name = "url"
    )]
    pub url: String,

    /// Name of the exchange through which requests are routed
    #[structopt(
        long,
        env = "EXCHANGE_NAME",
        default_value = "exchange",
        value_name = "name"
    )]
    pub exchange: String,

    /// Name of the shared reply queue for this service instance
    #[structopt(
        long = "local-queue",
        env = "LOCAL_QUEUE_NAME",
        default_value = "localQueue",
        value_name = "name"
    )]
    pub local_queue: String,
}

impl BrokerOptions {
    /// Descriptor for the configured exchange with the default routing strategy
    pub fn exchange_descriptor(&self) -> ExchangeDescriptor {
        ExchangeDescriptor::direct(&self.exchange)
    }

    /// Reply policy routing every reply into the shared local queue
    pub fn shared_reply_policy(&self) -> ReplyPolicy {
        ReplyPolicy::SharedQueue {
            name: self.local_queue.clone(),
        }
    }
}
