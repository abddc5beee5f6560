use std::fmt;

/// The error type for cellgraph service operations.
#[derive(Debug)]
pub enum Error {
    /// IO error at the store boundary.
    Io(std::io::Error),
    /// Error returned by the storage layer (key mapping, codecs, metadata).
    Storage(String),
    /// Error while planning or evaluating a query.
    Query(String),
    /// Invalid query configuration value.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

// Convert storage errors to string to hide internal types
impl From<cellgraph_storage::Error> for Error {
    fn from(e: cellgraph_storage::Error) -> Self {
        match e {
            cellgraph_storage::Error::Io(e) => Error::Io(e),
            _ => Error::Storage(e.to_string()),
        }
    }
}

// Convert query errors to string to hide internal types
impl From<cellgraph_query::Error> for Error {
    fn from(e: cellgraph_query::Error) -> Self {
        match e {
            cellgraph_query::Error::Io(e) => Error::Io(e),
            cellgraph_query::Error::Storage(e) => Error::from(e),
            _ => Error::Query(e.to_string()),
        }
    }
}

/// A specialized Result type for cellgraph operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_errors_map_to_service_variants() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(Error::from(cellgraph_storage::Error::Io(io)), Error::Io(_)));
        assert!(matches!(
            Error::from(cellgraph_storage::Error::UnknownType("Robot".into())),
            Error::Storage(_)
        ));
        assert!(matches!(
            Error::from(cellgraph_query::Error::Planning("bad".into())),
            Error::Query(_)
        ));
        assert!(matches!(
            Error::from(cellgraph_query::Error::Storage(
                cellgraph_storage::Error::MissingColumn("c".into())
            )),
            Error::Storage(_)
        ));
    }
}
