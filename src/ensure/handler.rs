use crate::amqp::{BrokerChannel, BrokerConnection};
use crate::ensure::{EnsureError, ErrorKind, ExecutionError, RetryPolicy};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// A unit of RPC-handling work executed inside a [`ChannelHandler`] scope.
///
/// # Implementers
///
/// While you can implement `Operation` for a struct or enum, most of the time
/// you will be relying on the blanket implementation for async functions with
/// a matching signature - `Fn(C::Channel, Arc<C>) -> Fut`. Any further
/// arguments the operation needs are captured by the closure.
///
/// Operations must raise failures through [`ExecutionError`] so that broker
/// errors (retried) stay distinguishable from application errors (never
/// retried).
#[async_trait::async_trait]
pub trait Operation<C: BrokerConnection>: Send + Sync {
    type Output: Send;

    async fn execute(
        &self,
        channel: C::Channel,
        connection: Arc<C>,
    ) -> Result<Self::Output, ExecutionError>;
}

/// Implement [`Operation`] for all async functions that match the expected
/// signature.
#[async_trait::async_trait]
impl<C, F, Fut, T> Operation<C> for F
where
    C: BrokerConnection,
    F: Fn(C::Channel, Arc<C>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ExecutionError>> + Send,
    T: Send,
{
    type Output = T;

    async fn execute(&self, channel: C::Channel, connection: Arc<C>) -> Result<T, ExecutionError> {
        (self)(channel, connection).await
    }
}

/// The resilience core: scoped acquisition of a broker channel plus an
/// execution primitive that retries the wrapped operation when the broker
/// signals a transient failure.
///
/// # Channel ownership
///
/// A handler either *owns* its channel ([`ChannelHandler::new`] - a fresh
/// channel is created on [`acquire`](Self::acquire) and closed on
/// [`release`](Self::release)), or *reuses* a caller-supplied channel
/// ([`ChannelHandler::with_channel`] / [`ChannelHandler::reuse`] - the
/// channel is used as-is and never closed by the handler). Reuse mode cannot
/// reacquire a channel, so it cannot retry: recoverable broker errors
/// propagate immediately.
///
/// # Retries
///
/// On a transport error the handler consults its [`RetryPolicy`]. A
/// recoverable error costs the broken channel: it is discarded, a fresh one
/// is opened on the same connection after a backoff, and the operation is
/// invoked again, up to the policy's attempt bound. Fatal transport errors
/// and application errors propagate immediately, untouched.
///
/// Each retry attempt runs on a fresh channel, so partial side effects of a
/// failed attempt are not rolled back - operations must be safe to repeat.
pub struct ChannelHandler<C: BrokerConnection> {
    connection: Arc<C>,
    channel: Option<C::Channel>,
    owns_channel: bool,
    policy: RetryPolicy,
}

impl<C: BrokerConnection> ChannelHandler<C> {
    /// A handler that creates and owns a fresh channel for the duration of
    /// the scope.
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            connection,
            channel: None,
            owns_channel: true,
            policy: RetryPolicy::default(),
        }
    }

    /// A handler in reuse mode, with no channel supplied yet.
    ///
    /// [`acquire`](Self::acquire) fails with [`EnsureError::MissingChannel`]
    /// until a channel is provided via [`supply_channel`](Self::supply_channel).
    pub fn reuse(connection: Arc<C>) -> Self {
        Self {
            connection,
            channel: None,
            owns_channel: false,
            policy: RetryPolicy::default(),
        }
    }

    /// A handler in reuse mode around an already-open channel.
    ///
    /// The handler will use the channel but never close it.
    pub fn with_channel(connection: Arc<C>, channel: C::Channel) -> Self {
        let mut handler = Self::reuse(connection);
        handler.supply_channel(channel);
        handler
    }

    /// Override the default retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Hand an already-open channel to a reuse-mode handler.
    pub fn supply_channel(&mut self, channel: C::Channel) {
        self.channel = Some(channel);
    }

    /// The currently active channel, if the scope has been entered.
    pub fn channel(&self) -> Option<&C::Channel> {
        self.channel.as_ref()
    }

    /// The connection this handler is bound to.
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    /// Enter the scope: make a channel active.
    ///
    /// In owned mode this opens a fresh channel on the connection; a failure
    /// to do so is surfaced immediately as
    /// [`EnsureError::ChannelAcquisition`], never retried - there is no
    /// channel to retry with yet.
    pub async fn acquire(&mut self) -> Result<(), EnsureError> {
        if self.owns_channel {
            let channel = self
                .connection
                .create_channel()
                .await
                .map_err(EnsureError::ChannelAcquisition)?;
            debug!("acquired a fresh channel for the scope");
            self.channel = Some(channel);
        } else if self.channel.is_none() {
            return Err(EnsureError::MissingChannel);
        }
        Ok(())
    }

    /// Invoke the operation with the active channel and the bound connection,
    /// retrying on recoverable broker errors up to the policy's bound.
    pub async fn run<Op>(&mut self, operation: &Op) -> Result<Op::Output, EnsureError>
    where
        Op: Operation<C> + ?Sized,
    {
        let mut attempts: usize = 0;
        loop {
            let channel = self.channel.clone().ok_or(EnsureError::MissingChannel)?;
            attempts += 1;
            let error = match operation
                .execute(channel, Arc::clone(&self.connection))
                .await
            {
                Ok(value) => return Ok(value),
                Err(ExecutionError::Application(error)) => {
                    return Err(EnsureError::Application(error))
                }
                Err(ExecutionError::Transport(error)) => error,
            };

            match self.policy.classify(&error) {
                ErrorKind::Fatal => return Err(EnsureError::Transport(error)),
                ErrorKind::Recoverable if !self.owns_channel => {
                    warn!(
                        error = %error,
                        "recoverable broker error on a reused channel; cannot reacquire, propagating"
                    );
                    return Err(EnsureError::Transport(error));
                }
                ErrorKind::Recoverable if attempts >= self.policy.attempt_limit() => {
                    return Err(EnsureError::RetryExhausted {
                        attempts,
                        source: error,
                    });
                }
                ErrorKind::Recoverable => {
                    warn!(
                        error = %error,
                        attempt = attempts,
                        "recoverable broker error; retrying with a fresh channel"
                    );
                    self.discard_channel().await;
                    tokio::time::sleep(self.policy.backoff(attempts)).await;
                    let channel = self
                        .connection
                        .create_channel()
                        .await
                        .map_err(EnsureError::ChannelAcquisition)?;
                    self.channel = Some(channel);
                }
            }
        }
    }

    /// Exit the scope: close the active channel if this handler owns it.
    ///
    /// Close-time errors are logged and swallowed - the primary result or
    /// error of the scope has already been determined by the time release
    /// runs.
    pub async fn release(&mut self) {
        if !self.owns_channel {
            return;
        }
        self.discard_channel().await;
    }

    /// Acquire, run and release in a guaranteed sequence.
    ///
    /// The release step runs whatever `run` returned, so a handler that owns
    /// its channel never leaks it on success, retry exhaustion or a fatal
    /// error.
    pub async fn scope<Op>(&mut self, operation: &Op) -> Result<Op::Output, EnsureError>
    where
        Op: Operation<C> + ?Sized,
    {
        self.acquire().await?;
        let outcome = self.run(operation).await;
        self.release().await;
        outcome
    }

    async fn discard_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(error) = channel.close().await {
                warn!(error = %error, "failed to close a channel owned by the scope");
            }
        }
    }
}

impl<C: BrokerConnection> Drop for ChannelHandler<C> {
    fn drop(&mut self) {
        // Backstop for cancellation: close() is async and cannot run here,
        // but dropping the last handle lets the transport reclaim the channel.
        if self.owns_channel && self.channel.is_some() {
            debug!("channel handler dropped with an open channel; the transport will reclaim it");
        }
    }
}
