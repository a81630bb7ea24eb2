use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The account service rejected the username/password.
    InvalidCredentials,
    /// The account service refused further login attempts for this account.
    AccountLocked,
    /// The IoT endpoint rejected the current AWS credentials (401/403).
    AuthExpired,
    /// A login-chain response was missing a field it is required to carry.
    AuthProtocol(String),
    Http(reqwest::Error),
    DeviceNotFound(String),
    Malformed(String),
    Server { status: u16 },
    UnknownDevice(String),
    InvalidMode(String),
    InvalidTemperature { requested: f64, min: f64, max: f64 },
}

impl Error {
    /// True for errors the poll/command paths resolve with a single
    /// credential refresh and retry.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCredentials => write!(f, "invalid account credentials"),
            Error::AccountLocked => write!(f, "account locked by the TCL service"),
            Error::AuthExpired => write!(f, "AWS credentials rejected (expired)"),
            Error::AuthProtocol(msg) => write!(f, "auth protocol error: {msg}"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::DeviceNotFound(id) => write!(f, "device not found: {id}"),
            Error::Malformed(msg) => write!(f, "malformed response: {msg}"),
            Error::Server { status } => write!(f, "server error: HTTP {status}"),
            Error::UnknownDevice(id) => write!(f, "device not registered: {id}"),
            Error::InvalidMode(msg) => write!(f, "invalid mode: {msg}"),
            Error::InvalidTemperature { requested, min, max } => write!(
                f,
                "target temperature {requested}\u{00b0}C outside {min}..{max}\u{00b0}C"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
