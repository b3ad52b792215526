//! The public decoration point exposed to host service frameworks.

use crate::amqp::BrokerConnection;
use crate::ensure::{ChannelHandler, EnsureError, Operation};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::Arc;

/// Wrap an operation so that every invocation runs inside a channel handler
/// scope.
///
/// The adapted function has the same call and error contract as the raw
/// operation: it returns the operation's result unchanged and re-raises its
/// errors, gaining automatic channel lifecycle management on the way. The
/// handler runs in reuse mode around the connection's shared default channel,
/// so a recoverable broker error propagates to the host framework rather than
/// being retried on a channel the adapter does not own.
///
/// ```rust
/// use nova_compat::amqp::{Channel, Connection};
/// use nova_compat::entrypoint::ensure;
/// use nova_compat::ensure::ExecutionError;
/// use std::sync::Arc;
///
/// async fn handle_rpc(channel: Channel, _connection: Arc<Connection>) -> Result<(), ExecutionError> {
///     // publish the Nova reply on `channel` here
///     let _ = channel;
///     Ok(())
/// }
///
/// // Function for asyncness.
/// async fn example(connection: Arc<Connection>) -> anyhow::Result<()> {
///     let adapted = ensure(handle_rpc);
///     adapted(connection).await?;
///     Ok(())
/// }
/// ```
pub fn ensure<C, Op>(
    operation: Op,
) -> impl Fn(Arc<C>) -> BoxFuture<'static, Result<Op::Output, EnsureError>> + Clone
where
    C: BrokerConnection,
    Op: Operation<C> + 'static,
    Op::Output: 'static,
{
    let operation = Arc::new(operation);
    move |connection: Arc<C>| {
        let operation = Arc::clone(&operation);
        async move {
            let channel = connection
                .default_channel()
                .await
                .map_err(EnsureError::ChannelAcquisition)?;
            let mut handler = ChannelHandler::with_channel(connection, channel);
            handler.scope(operation.as_ref()).await
        }
        .boxed()
    }
}
