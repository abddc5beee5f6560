//! Error and result types for the query crate.

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Storage(cellgraph_storage::Error),
    /// The predicate tree cannot be planned against the type and key mapping.
    Planning(String),
    /// A value, operator and flavor combination has no defined result.
    Evaluation(String),
    /// An API was used in a way its contract forbids.
    Contract(&'static str),
    Materialize(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::Storage(err) => write!(f, "storage error: {err}"),
            Error::Planning(msg) => write!(f, "planning error: {msg}"),
            Error::Evaluation(msg) => write!(f, "evaluation error: {msg}"),
            Error::Contract(msg) => write!(f, "{msg}"),
            Error::Materialize(msg) => write!(f, "materialize error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<cellgraph_storage::Error> for Error {
    fn from(err: cellgraph_storage::Error) -> Self {
        Error::Storage(err)
    }
}
