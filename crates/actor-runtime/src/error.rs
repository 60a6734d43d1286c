//! # Runtime Errors
//!
//! This module defines the error types used throughout the actor runtime.
//!
//! Only construction-time problems surface as `Err` values. A call made through a
//! proxy never returns an error to its caller: undeliverable messages end up in
//! [`DeadLetters`](crate::DeadLetters) instead.

use crate::address::Address;

/// Errors raised synchronously while building or operating a [`Stage`](crate::Stage).
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("No tokio runtime is available to host the stage")]
    NoRuntime,
    #[error("Unknown mailbox type: {0}")]
    UnknownMailbox(String),
    #[error("Address already in use: {0}")]
    AddressInUse(Address),
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("Plugin {plugin} failed to start: {source}")]
    PluginStart {
        plugin: String,
        #[source]
        source: PluginError,
    },
    #[error("Stage terminated")]
    StageTerminated,
}

/// Reasons a mailbox refused a message.
///
/// Proxies translate these into dead letters; they are never handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox closed")]
    Closed,
    #[error("Mailbox full")]
    Full,
}

/// Failure outcomes of a [`Completes`](crate::Completes) handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletesError {
    #[error("No routees available")]
    NoRoutees,
    #[error("Timed out waiting for outcome")]
    TimedOut,
    #[error("Failed: {0}")]
    Failed(String),
}

/// Errors a [`Plugin`](crate::Plugin) reports from `start`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("Invalid value {value:?} for property {property}")]
    InvalidProperty { property: String, value: String },
    #[error("{0}")]
    Failed(String),
}
