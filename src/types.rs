use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Result type returned from all fallible operations in this crate.
pub type RedisResult<T> = Result<T, RedisError>;

/// A redis reply as returned by the transport.
///
/// While on the redis protocol there is an error type, errors are already
/// separated at the transport boundary so the value only holds the
/// remaining types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// A nil response from the server.
    Nil,
    /// An integer response.
    Int(i64),
    /// An arbitrary binary data response.
    Data(Vec<u8>),
    /// A nested response of more data.
    Bulk(Vec<Value>),
    /// A status response.
    Status(String),
    /// A status response which represents the string "OK".
    Okay,
}

/// An enum of all error kinds.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The server generated an invalid response.
    ResponseError,
    /// No routable key could be derived from the command.
    InvalidClusterKey,
    /// The slot has no mapped connection.
    NoConnection,
    /// The slot's authoritative node has changed.
    Moved,
    /// The slot is migrating; re-route this one request with `ASKING`.
    Ask,
    /// The command could not be served right now; retry later.
    TryAgain,
    /// The cluster cannot serve the slot.
    ClusterDown,
    /// Keys of one request hash to different slots.
    CrossSlot,
    /// An I/O failure reported by the transport.
    IoError,
    /// An error raised on the client before execution.
    ClientError,
    /// A server error code not directly understood by the library.
    ExtensionError,
}

/// Represents a redis cluster error.
///
/// For the most part you should be using the `Error` trait to interact
/// with this rather than the actual struct.
#[derive(Clone)]
pub struct RedisError {
    repr: ErrorRepr,
}

#[derive(Clone, Debug)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    ExtensionError(String, Option<String>),
    IoError(Arc<io::Error>),
}

impl PartialEq for RedisError {
    fn eq(&self, other: &RedisError) -> bool {
        match (&self.repr, &other.repr) {
            (&ErrorRepr::WithDescription(kind_a, _), &ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                &ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                &ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::ExtensionError(a, _), ErrorRepr::ExtensionError(b, _)) => *a == *b,
            _ => false,
        }
    }
}

impl From<io::Error> for RedisError {
    fn from(err: io::Error) -> RedisError {
        RedisError {
            repr: ErrorRepr::IoError(Arc::new(err)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for RedisError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> RedisError {
        RedisError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for RedisError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> RedisError {
        RedisError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl error::Error for RedisError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.repr {
            ErrorRepr::IoError(ref err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for RedisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            ErrorRepr::WithDescription(_, desc) => desc.fmt(f),
            ErrorRepr::WithDescriptionAndDetail(_, desc, ref detail) => {
                desc.fmt(f)?;
                f.write_str(": ")?;
                detail.fmt(f)
            }
            ErrorRepr::ExtensionError(ref code, ref detail) => match detail {
                Some(detail) => write!(f, "{code}: {detail}"),
                None => write!(f, "{code}: unknown extension error"),
            },
            ErrorRepr::IoError(ref err) => err.fmt(f),
        }
    }
}

impl fmt::Debug for RedisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl RedisError {
    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _) => kind,
            ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::ExtensionError(_, _) => ErrorKind::ExtensionError,
            ErrorRepr::IoError(_) => ErrorKind::IoError,
        }
    }

    /// Returns the error detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::ExtensionError(_, ref detail) => detail.as_deref(),
            _ => None,
        }
    }

    /// Returns the raw server error code, if the error carries one.
    pub fn code(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::ExtensionError(ref code, _) => Some(code),
            _ => match self.kind() {
                ErrorKind::ResponseError => Some("ERR"),
                ErrorKind::Moved => Some("MOVED"),
                ErrorKind::Ask => Some("ASK"),
                ErrorKind::TryAgain => Some("TRYAGAIN"),
                ErrorKind::ClusterDown => Some("CLUSTERDOWN"),
                ErrorKind::CrossSlot => Some("CROSSSLOT"),
                _ => None,
            },
        }
    }

    /// Indicates that this failure is an IO failure.
    pub fn is_io_error(&self) -> bool {
        self.kind() == ErrorKind::IoError
    }

    /// Indicates that this is an error raised by the cluster redirection
    /// protocol rather than by the command itself.
    pub fn is_cluster_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Moved | ErrorKind::Ask | ErrorKind::TryAgain | ErrorKind::ClusterDown
        )
    }

    /// Returns the node a MOVED or ASK error redirects to.
    ///
    /// This returns `(addr, slot_id)` where `addr` is in `host:port`
    /// notation. `None` is returned for non-redirection errors and for
    /// redirections whose payload cannot be parsed; callers are expected
    /// to fall back to a plain retry in the latter case.
    pub fn redirect_node(&self) -> Option<(&str, u16)> {
        if !matches!(self.kind(), ErrorKind::Moved | ErrorKind::Ask) {
            return None;
        }
        let mut iter = self.detail()?.split_ascii_whitespace();
        let slot_id: u16 = iter.next()?.parse().ok()?;
        let addr = iter.next()?;
        Some((addr, slot_id))
    }
}

/// Converts a raw server error line into a typed error.
///
/// The first word of the line is the error code (`MOVED`, `ASK`,
/// `TRYAGAIN`, ...); the remainder is kept as the error detail so that
/// redirection payloads stay parseable. Unknown codes become extension
/// errors.
pub fn make_server_error(line: &str) -> RedisError {
    let mut pieces = line.splitn(2, ' ');
    let code = pieces.next().unwrap_or("");
    let detail = pieces.next().map(str::trim).filter(|d| !d.is_empty());

    let kind = match code {
        "ERR" => ErrorKind::ResponseError,
        "MOVED" => ErrorKind::Moved,
        "ASK" => ErrorKind::Ask,
        "TRYAGAIN" => ErrorKind::TryAgain,
        "CLUSTERDOWN" => ErrorKind::ClusterDown,
        "CROSSSLOT" => ErrorKind::CrossSlot,
        _ => {
            return RedisError {
                repr: ErrorRepr::ExtensionError(code.to_string(), detail.map(str::to_string)),
            }
        }
    };

    let desc = "An error was signalled by the server";
    match detail {
        Some(detail) => RedisError::from((kind, desc, detail.to_string())),
        None => RedisError::from((kind, desc)),
    }
}
