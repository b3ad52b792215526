//! The resilient channel execution layer.
//!
//! A [`ChannelHandler`] acquires a broker channel for the duration of a
//! scope, runs an [`Operation`] against it and, when the broker fails
//! mid-operation, consults its [`RetryPolicy`] to decide between retrying
//! with a fresh channel and surfacing the failure. The channel is released
//! on every exit path.
//!
//! ```rust
//! use nova_compat::amqp::configuration::AmqpSettings;
//! use nova_compat::amqp::{Channel, Connection, ConnectionFactory};
//! use nova_compat::ensure::{ChannelHandler, ExecutionError};
//! use std::sync::Arc;
//!
//! // Function for asyncness.
//! async fn example() -> anyhow::Result<()> {
//!     let factory = ConnectionFactory::new_from_config(&AmqpSettings::default());
//!     let connection = Arc::new(factory.new_connection().await?);
//!
//!     let operation = |channel: Channel, _connection: Arc<Connection>| async move {
//!         // publish the Nova reply on `channel` here
//!         let _ = channel;
//!         Ok::<_, ExecutionError>("pong")
//!     };
//!
//!     let mut handler = ChannelHandler::new(connection);
//!     let reply = handler.scope(&operation).await?;
//!     assert_eq!(reply, "pong");
//!     Ok(())
//! }
//! ```

mod error;
mod handler;
mod retry;

pub use error::{EnsureError, ExecutionError};
pub use handler::{ChannelHandler, Operation};
pub use retry::{ErrorKind, RetryPolicy};
