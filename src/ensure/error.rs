/// The error type operations must raise through so that broker failures can
/// be told apart from application failures.
///
/// The distinction drives retries: transport errors are classified by the
/// [`RetryPolicy`](crate::ensure::RetryPolicy), while application errors are
/// always fatal and propagate untouched.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A broker/transport-layer failure observed while using the channel.
    #[error("Transport failure while talking to the broker")]
    Transport(#[from] lapin::Error),
    /// An error raised by the application logic inside the operation.
    #[error("The wrapped operation failed")]
    Application(#[source] anyhow::Error),
}

impl ExecutionError {
    /// Wrap an application error.
    pub fn application<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Application(error.into())
    }
}

/// Error returned when running an operation inside a channel handler scope.
#[derive(Debug, thiserror::Error)]
pub enum EnsureError {
    /// A channel could not be opened or obtained.
    ///
    /// Never retried by the channel handler itself - there was no channel to
    /// retry with - and surfaced to the scope's caller immediately.
    #[error("Failed to open a channel on the AMQP connection")]
    ChannelAcquisition(#[source] lapin::Error),
    /// A handler in reuse mode entered its scope without being supplied a channel.
    #[error("No channel was supplied to a channel handler in reuse mode")]
    MissingChannel,
    /// A recoverable broker error persisted past the configured attempt bound.
    ///
    /// Wraps the last underlying transport error.
    #[error("Broker error persisted after {attempts} attempt(s)")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: lapin::Error,
    },
    /// A transport error that could not be retried: either classified fatal,
    /// or recoverable but hit by a handler in reuse mode (which cannot
    /// reacquire a channel).
    #[error("Transport failure while talking to the broker")]
    Transport(#[source] lapin::Error),
    /// The wrapped operation's own error, crossing the boundary untouched.
    #[error("The wrapped operation failed")]
    Application(#[source] anyhow::Error),
}

impl EnsureError {
    /// The number of invocation attempts recorded on the error, if any.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            Self::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
