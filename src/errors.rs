use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelloError {
    #[error("failed to bind {address} ({source})")]
    Bind { address: String, #[source] source: std::io::Error },

    #[error("invalid drone address {address}")]
    InvalidAddress { address: String },

    #[error("I/O error - {0}")]
    Io(#[from] std::io::Error),

    #[error("\"{command}\" expects {expected} parameter(s), got {actual}")]
    InvalidArity { command: String, expected: usize, actual: usize },

    #[error("invalid syntax - {msg}")]
    InvalidSyntax { msg: String },

    #[error("unknown command \"{name}\"")]
    UnknownCommand { name: String },

    #[error("failed to parse \"{msg}\"")]
    ParseError { msg: String },

    #[error("a stream is already active")]
    StreamAlreadyActive,

    #[error("no stream is active")]
    NoActiveStream,

    #[error("capture is not running")]
    CaptureNotRunning,

    #[error("invalid stream url {url}")]
    InvalidStreamUrl { url: String },

    #[error("drone did not enter command mode - {msg}")]
    InitFailed { msg: String },

    #[error("scheduler has been shut down")]
    SchedulerShutdown,

    #[error("period of a recurring task must be non-zero")]
    InvalidPeriod,

    #[error("no command channel, use TelloOptions::with_command")]
    NoCommandChannel,
}

pub type Result<T, E = TelloError> = std::result::Result<T, E>;
