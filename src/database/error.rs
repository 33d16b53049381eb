use scylla::transport::errors::{NewSessionError, QueryError};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Session(NewSessionError),
    Query(QueryError),
    UnknownConsistency(String),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<NewSessionError> for Error {
    fn from(e: NewSessionError) -> Self {
        Error::Session(e)
    }
}

impl From<QueryError> for Error {
    fn from(e: QueryError) -> Self {
        Error::Query(e)
    }
}
