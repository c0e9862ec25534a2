use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    InvalidArgument,
    InvalidQuery,
    InvalidState,
    Disposed,
    LockContention,
    CorruptIndex,
    Cancelled,
    WriteFailed,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
    /// Key of the source document being processed when the error happened, if known.
    pub document_key: Option<String>,
    pub cause: Option<Box<Error>>,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
            document_key: None,
            cause: None,
        }
    }

    /// Wraps `cause` under a new error of `kind`.
    pub fn wrap(kind: ErrorKind, context: impl Into<String>, cause: Error) -> Self {
        Error {
            kind,
            context: context.into(),
            document_key: cause.document_key.clone(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn for_document(mut self, key: impl Into<String>) -> Self {
        self.document_key = Some(key.into());
        self
    }

    /// True when this error or anything in its cause chain has `kind`.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(err) = current {
            if err.kind == kind {
                return true;
            }
            current = err.cause.as_deref();
        }
        false
    }

    pub fn disposed(index: &str) -> Self {
        Error::new(ErrorKind::Disposed, format!("Index {} has been disposed", index))
    }

    pub fn corrupt(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::CorruptIndex, context)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)?;
        if let Some(key) = &self.document_key {
            write!(f, " (document '{}')", key)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io, err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::new(ErrorKind::Parse, err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Parse, format!("JSON error: {}", err))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::new(ErrorKind::InvalidQuery, format!("Invalid pattern: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_kind_walks_the_cause_chain() {
        let inner = Error::corrupt("bad checksum in _3.seg");
        let outer = Error::wrap(ErrorKind::WriteFailed, "Could not properly write to index Users", inner);

        assert!(outer.has_kind(ErrorKind::WriteFailed));
        assert!(outer.has_kind(ErrorKind::CorruptIndex));
        assert!(!outer.has_kind(ErrorKind::Io));
    }

    #[test]
    fn wrap_keeps_document_key() {
        let inner = Error::new(ErrorKind::Internal, "boom").for_document("users/1");
        let outer = Error::wrap(ErrorKind::WriteFailed, "write", inner);

        assert_eq!(outer.document_key.as_deref(), Some("users/1"));
        assert!(outer.to_string().contains("users/1"));
        assert!(outer.to_string().contains("boom"));
    }
}
