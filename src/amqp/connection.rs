//! The transport seam between the resilience core and the broker client.
//!
//! [`BrokerConnection`] and [`BrokerChannel`] define the operations the
//! channel execution layer needs from a transport - creating channels,
//! handing out a shared default channel and closing things down. The
//! [`Connection`] type implements them on top of [`lapin`]; tests implement
//! them on an in-memory fake to observe channel lifecycles.

use crate::amqp::configuration::TransportOptions;
use lapin::options::ConfirmSelectOptions;
use lapin::protocol::constants::REPLY_SUCCESS;
use lapin::ChannelState;
use tokio::sync::Mutex;

/// A channel handed out by a [`BrokerConnection`].
///
/// Channels are cheap handles: cloning one refers to the same underlying
/// broker channel.
#[async_trait::async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    /// Close the channel on the broker.
    async fn close(&self) -> Result<(), lapin::Error>;
}

/// A logical link to the broker, safe for concurrent use by multiple
/// channel handlers.
///
/// The resilience core never opens connections on its own - only channels
/// against a connection supplied by the caller.
#[async_trait::async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    type Channel: BrokerChannel + Clone;

    /// Open a fresh channel on this connection.
    async fn create_channel(&self) -> Result<Self::Channel, lapin::Error>;

    /// Get the connection's shared default channel, opening it on first use.
    ///
    /// Callers must not close the returned channel: it is owned by the
    /// connection and reused across invocations.
    async fn default_channel(&self) -> Result<Self::Channel, lapin::Error>;

    /// Close the connection itself.
    async fn close(&self) -> Result<(), lapin::Error>;
}

#[async_trait::async_trait]
impl BrokerChannel for lapin::Channel {
    async fn close(&self) -> Result<(), lapin::Error> {
        lapin::Channel::close(self, REPLY_SUCCESS, "scope released").await
    }
}

/// A [`lapin::Connection`] together with the Nova transport options that
/// apply to every channel it hands out.
pub struct Connection {
    inner: lapin::Connection,
    transport_options: TransportOptions,
    default_channel: Mutex<Option<lapin::Channel>>,
}

impl Connection {
    pub(crate) fn new(inner: lapin::Connection, transport_options: TransportOptions) -> Self {
        Self {
            inner,
            transport_options,
            default_channel: Mutex::new(None),
        }
    }

    /// The transport options this connection was opened with.
    pub fn transport_options(&self) -> TransportOptions {
        self.transport_options
    }

    async fn open_channel(&self) -> Result<lapin::Channel, lapin::Error> {
        let channel = self.inner.create_channel().await?;
        if self.transport_options.confirm_publish {
            channel
                .confirm_select(ConfirmSelectOptions { nowait: false })
                .await?;
        }
        Ok(channel)
    }
}

#[async_trait::async_trait]
impl BrokerConnection for Connection {
    type Channel = lapin::Channel;

    async fn create_channel(&self) -> Result<lapin::Channel, lapin::Error> {
        self.open_channel().await
    }

    async fn default_channel(&self) -> Result<lapin::Channel, lapin::Error> {
        let mut guard = self.default_channel.lock().await;
        if let Some(channel) = guard.as_ref() {
            // A broker-closed default channel is replaced, not resurrected.
            if matches!(channel.status().state(), ChannelState::Connected) {
                return Ok(channel.clone());
            }
        }
        let channel = self.open_channel().await?;
        *guard = Some(channel.clone());
        Ok(channel)
    }

    async fn close(&self) -> Result<(), lapin::Error> {
        self.inner.close(REPLY_SUCCESS, "connection released").await
    }
}
