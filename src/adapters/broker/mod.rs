//! Message broker integration
//!
//! [`MessageBroker`] is the transport seam. [`RabbitMqBroker`] talks AMQP to a
//! RabbitMQ server; [`InMemoryBroker`] keeps queues in process for tests and
//! dry runs. [`process_messages`] is the single-threaded dispatch loop shared
//! by every consumer.

pub mod access;
pub mod memory;
pub mod processing;
pub mod rabbitmq;
pub mod traits;

pub use access::{connect_to_queue, connect_to_server_and_queue, send_to_queue, QueueTarget};
pub use memory::{BrokerStats, InMemoryBroker};
pub use processing::process_messages;
pub use rabbitmq::RabbitMqBroker;
pub use traits::{
    Acknowledger, BrokerCredentials, Delivery, MessageBroker, MessageHandler, MessageStream,
};
