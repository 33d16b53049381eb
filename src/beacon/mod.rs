pub mod client;
pub mod types;

pub use client::BeaconNodeHttpClient;
pub use types::StateId;

use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// A transport-level failure (connection, timeout, decode).
    Reqwest(reqwest::Error),
    /// A non-retryable, non-200 response from the beacon node.
    ServerMessage { status: u16, body: String },
    /// A retryable response kept failing after exhausting the retry budget.
    RetriesExhausted {
        attempts: u32,
        status: u16,
        body: String,
    },
    InvalidUrl(String),
    InvalidConfig(String),
    /// The root deadline was cancelled while the request was in flight.
    Shutdown,
}

impl Error {
    /// The HTTP status of the failing response, if the failure got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Reqwest(e) => e.status().map(|s| s.as_u16()),
            Error::ServerMessage { status, .. } => Some(*status),
            Error::RetriesExhausted { status, .. } => Some(*status),
            Error::InvalidUrl(_) | Error::InvalidConfig(_) | Error::Shutdown => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Reqwest(e)
    }
}
