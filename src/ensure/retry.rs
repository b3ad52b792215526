//! Pure classification and bounded-retry arithmetic, decoupled from I/O so
//! it is independently testable.

use std::fmt;
use std::time::Duration;

/// Kinds of failure observed while a channel or connection is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A broker/transport-layer failure expected to be resolved by
    /// reacquiring a channel - e.g. the broker closed the channel, the
    /// connection dropped, a heartbeat timed out.
    Recoverable,
    /// A failure that will recur no matter how many fresh channels you throw
    /// at it.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "recoverable"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Decides whether a broker error is worth a retry, how many attempts a
/// scope gets and how long to back off between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Set the bound on total invocation attempts per scope.
    ///
    /// Values below 1 are clamped to 1: every scope gets at least one attempt.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the delay observed before the first retry.
    pub fn initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Set the cap on the backoff delay.
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub(crate) fn attempt_limit(&self) -> usize {
        self.max_attempts
    }

    /// Classify a transport error as recoverable or fatal.
    ///
    /// This is the single place where the classification rule lives.
    /// Recoverable covers the shapes `lapin` produces when the broker drops
    /// the connection, closes a channel underneath us or a heartbeat dies.
    /// Protocol, parsing and serialisation errors are fatal: a broker that
    /// rejected a frame once will reject it again on a fresh channel.
    pub fn classify(&self, error: &lapin::Error) -> ErrorKind {
        match error {
            lapin::Error::IOError(_)
            | lapin::Error::InvalidConnectionState(_)
            | lapin::Error::InvalidChannelState(_)
            | lapin::Error::InvalidChannel(_) => ErrorKind::Recoverable,
            _ => ErrorKind::Fatal,
        }
    }

    /// The delay to observe before the retry following the given attempt.
    ///
    /// Doubles from the initial backoff, capped at the configured maximum;
    /// monotonically non-decreasing across attempts.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}
