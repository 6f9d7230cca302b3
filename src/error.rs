use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Error related to malformed construction input (identity, endpoint)
    Validation,
    /// Error related to the server terminating the session with a fatal close code
    Session,
    /// Error related to an auction query that produced no usable response
    Query,
    /// Error related to WebSocket connections
    WebSocket,
    /// Error related to encoding or decoding protocol messages
    Codec,
    /// Internal error from dependencies
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    pub fn query<S: Into<String>>(message: S) -> Self {
        QueryFailed {
            reason: message.into(),
        }
        .into()
    }

    #[must_use]
    pub fn closed(code: u16, reason: String) -> Self {
        Closed { code, reason }.into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

/// The server closed the connection with a code that must not be retried.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Closed {
    /// Close code sent by the server
    pub code: u16,
    /// Reason text sent alongside the close code (may be empty)
    pub reason: String,
}

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "session closed with code {}", self.code)
        } else {
            write!(
                f,
                "session closed with code {} and reason \"{}\"",
                self.code, self.reason
            )
        }
    }
}

impl StdError for Closed {}

#[non_exhaustive]
#[derive(Debug)]
pub struct QueryFailed {
    pub reason: String,
}

impl fmt::Display for QueryFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query failed: {}", self.reason)
    }
}

impl StdError for QueryFailed {}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::with_source(Kind::Codec, e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::with_source(Kind::Codec, e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Codec, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

impl From<tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue> for Error {
    fn from(e: tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<Closed> for Error {
    fn from(err: Closed) -> Self {
        Error::with_source(Kind::Session, err)
    }
}

impl From<QueryFailed> for Error {
    fn from(err: QueryFailed) -> Self {
        Error::with_source(Kind::Query, err)
    }
}
