//! Crate-wide error type.
//!
//! Every fallible operation in the engine returns one of these kinds so that
//! call sites can make a retry decision without inspecting strings. RPC
//! failures are classified at the chain-client boundary; everything else maps
//! onto the ambient kinds (`Database`, `Connection`, `Parse`, `Config`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Network hiccup, 5xx, or timeout. Safe to retry with backoff.
    #[error("transient RPC error: {0}")]
    RpcTransient(String),

    /// Misconfiguration or auth failure. The affected task stops.
    #[error("fatal RPC error: {0}")]
    RpcFatal(String),

    /// Another pending transaction holds the account nonce.
    #[error("nonce conflict on pending transaction")]
    NonceConflict,

    /// A write ran out of gas.
    #[error("transaction ran out of gas")]
    OutOfGas,

    /// Business-logic failure reported by the contract. Never retried.
    #[error("contract reverted: {reason}")]
    ContractRevert { reason: String },

    /// Unique-index violation. Expected on concurrent or replayed creation;
    /// the caller reads the existing row and continues.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Subscriber closed or fell behind. The subscription is dropped.
    #[error("stream sink broken")]
    StreamSinkBroken,

    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for kinds the caller may retry after a backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RpcTransient(_) | Error::NonceConflict | Error::OutOfGas
        )
    }

    /// True for kinds that must stop the owning task for good.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::RpcFatal(_) | Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(Error::RpcTransient("503".into()).is_transient());
        assert!(Error::NonceConflict.is_transient());
        assert!(Error::OutOfGas.is_transient());
    }

    #[test]
    fn revert_and_duplicate_are_not_retryable() {
        let revert = Error::ContractRevert {
            reason: "market exists".into(),
        };
        assert!(!revert.is_transient());
        assert!(!Error::DuplicateKey("markets".into()).is_transient());
    }

    #[test]
    fn fatal_kinds_stop_the_task() {
        assert!(Error::RpcFatal("bad auth".into()).is_fatal());
        assert!(!Error::RpcTransient("timeout".into()).is_fatal());
    }
}
