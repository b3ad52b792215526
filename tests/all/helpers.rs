use async_trait::async_trait;
use nova_compat::amqp::{BrokerChannel, BrokerConnection};
use nova_compat::ensure::RetryPolicy;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The transport error a broker produces when the connection drops mid-operation.
pub fn connection_reset() -> lapin::Error {
    lapin::Error::IOError(Arc::new(io::Error::new(
        io::ErrorKind::ConnectionReset,
        "connection reset",
    )))
}

/// A retry policy with no backoff, so tests don't sleep.
pub fn fast_policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::default()
        .max_attempts(max_attempts)
        .initial_backoff(Duration::ZERO)
}

/// An in-memory stand-in for a broker connection, with observable channel
/// lifecycle counters and scriptable failures.
pub struct FakeConnection {
    id: usize,
    close_log: Arc<Mutex<Vec<usize>>>,
    channels_created: AtomicUsize,
    open_channels: Arc<AtomicUsize>,
    create_failures: Mutex<VecDeque<lapin::Error>>,
    default_channel: Mutex<Option<FakeChannel>>,
    fail_close: AtomicBool,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct FakeChannel {
    open: Arc<AtomicBool>,
    open_channels: Arc<AtomicUsize>,
}

impl FakeConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_close_log(0, Arc::default()))
    }

    /// A connection that records its `id` in the shared `close_log` when closed.
    pub fn with_close_log(id: usize, close_log: Arc<Mutex<Vec<usize>>>) -> Self {
        Self {
            id,
            close_log,
            channels_created: AtomicUsize::new(0),
            open_channels: Arc::new(AtomicUsize::new(0)),
            create_failures: Mutex::new(VecDeque::new()),
            default_channel: Mutex::new(None),
            fail_close: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// How many times a channel was created on this connection.
    pub fn channels_created(&self) -> usize {
        self.channels_created.load(Ordering::SeqCst)
    }

    /// How many channels are currently open.
    pub fn open_channels(&self) -> usize {
        self.open_channels.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Script the next channel creation to fail with `error`.
    pub fn fail_channel_creation(&self, error: lapin::Error) {
        self.create_failures.lock().unwrap().push_back(error);
    }

    /// Make `close` fail for this connection.
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BrokerChannel for FakeChannel {
    async fn close(&self) -> Result<(), lapin::Error> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.open_channels.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerConnection for FakeConnection {
    type Channel = FakeChannel;

    async fn create_channel(&self) -> Result<FakeChannel, lapin::Error> {
        if let Some(error) = self.create_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.channels_created.fetch_add(1, Ordering::SeqCst);
        self.open_channels.fetch_add(1, Ordering::SeqCst);
        Ok(FakeChannel {
            open: Arc::new(AtomicBool::new(true)),
            open_channels: Arc::clone(&self.open_channels),
        })
    }

    async fn default_channel(&self) -> Result<FakeChannel, lapin::Error> {
        let existing = self.default_channel.lock().unwrap().clone();
        if let Some(channel) = existing {
            return Ok(channel);
        }
        let channel = self.create_channel().await?;
        *self.default_channel.lock().unwrap() = Some(channel.clone());
        Ok(channel)
    }

    async fn close(&self) -> Result<(), lapin::Error> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(connection_reset());
        }
        self.closed.store(true, Ordering::SeqCst);
        self.close_log.lock().unwrap().push(self.id);
        Ok(())
    }
}
