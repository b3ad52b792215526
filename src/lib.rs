//! `nova-compat` bridges the legacy Nova RPC wire convention onto AMQP-based
//! services, built on top of [`lapin`].
//!
//! The core of the crate is the resilient channel execution layer in
//! [`ensure`]: a [`ChannelHandler`](crate::ensure::ChannelHandler) acquires a
//! broker channel for the duration of a scope, runs a unit of RPC-handling
//! work against it and, when the broker fails mid-operation, decides whether
//! to transparently retry with a fresh channel or to surface the failure to
//! the caller.
//!
//! [`entrypoint::ensure`](crate::entrypoint::ensure) is the composition point
//! exposed to host frameworks: it wraps a handler function so that every
//! invocation runs inside a channel handler scope, without changing the
//! handler's call or error contract.

pub mod ensure;
pub mod entrypoint;
pub mod registry;

pub mod amqp;
