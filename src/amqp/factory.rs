use crate::amqp::configuration::{AmqpSettings, TransportOptions};
use crate::amqp::Connection;
use lapin::{uri::AMQPUri, ConnectionProperties};
use tokio::time::timeout;
use tracing::warn;

#[derive(Clone)]
/// All the information required to connect to an AMQP broker.
pub struct ConnectionFactory {
    uri: AMQPUri,
    /// The timeout observed when trying to connect to the broker.
    connection_timeout: std::time::Duration,
    /// Nova transport options applied to every channel handed out by the
    /// connections built by this factory.
    transport_options: TransportOptions,
}

impl ConnectionFactory {
    /// Create a new connection factory from settings.
    ///
    /// A connection timeout can be (optionally) specified in `settings`.
    /// If the connection timeout is left unspecified, it will be defaulted to 10 seconds.
    pub fn new_from_config(settings: &AmqpSettings) -> Self {
        let connection_timeout = settings
            .connection_timeout()
            .unwrap_or_else(|| std::time::Duration::from_secs(10));
        Self {
            uri: settings.amqp_uri(),
            connection_timeout,
            transport_options: settings.transport_options,
        }
    }

    /// Create a new connection to the broker.
    #[tracing::instrument(name = "amqp_connect", skip(self))]
    pub async fn new_connection(&self) -> Result<Connection, anyhow::Error> {
        let properties =
            ConnectionProperties::default().with_executor(tokio_executor_trait::Tokio::current());
        let connection = timeout(
            self.connection_timeout,
            lapin::Connection::connect_uri(self.uri.clone(), properties),
        )
        .await??;
        // Register a callback to log connection errors.
        connection.on_error(|e| {
            warn!("AMQP broken connection: {:?}", e);
        });
        Ok(Connection::new(connection, self.transport_options))
    }
}
