//! Helpers for connecting to an AMQP broker.

pub mod configuration;
mod connection;
mod factory;

pub use connection::{BrokerChannel, BrokerConnection, Connection};
pub use factory::ConnectionFactory;

pub use lapin::{options, types, Channel};
