//! Error types for mission parsing, lookup persistence and ledger updates.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the solver library.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a file failed.
    #[error("cannot access {path}")]
    Io {
        /// Path of the file involved.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A JSON document could not be read or written.
    #[error("invalid JSON in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The listings table could not be parsed.
    #[error("invalid listings table {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// Building the lookup requires a declared origin system.
    #[error("no origin declared; cannot locate home coordinates")]
    MissingOrigin,
    /// The declared origin system is not present in the systems file.
    #[error("origin system {0} not found in reference data")]
    UnknownSystem(String),
    /// A ledger mutation was rejected.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Reasons a [`crate::commodity::LedgerAction`] is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("commodity {0} is not tracked by the ledger")]
    UnknownCommodity(String),
    #[error("no {commodity} is owed at {station} in {system}")]
    NoObligation {
        commodity: String,
        system: String,
        station: String,
    },
    #[error("cannot sell {requested} of {commodity}: {owed} owed, {held} held")]
    InsufficientStock {
        commodity: String,
        requested: u32,
        owed: u32,
        held: u32,
    },
    #[error("cannot buy {requested} of {commodity}: only {free} cargo free")]
    InsufficientCargo {
        commodity: String,
        requested: u32,
        free: u32,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
