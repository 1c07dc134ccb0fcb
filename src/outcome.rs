use std::fmt;

/// What kind of response an exchange produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Ok,
    Error,
    Reading
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Ok => "OK",
            OutcomeStatus::Error => "ERROR",
            OutcomeStatus::Reading => "READING",
        };
        f.write_str(s)
    }
}

/// The result of one command exchange with the drone.
///
/// For `Ok` the message is the drone's response text verbatim, for `Error`
/// it describes what went wrong locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    status: OutcomeStatus,
    message: String
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { status: OutcomeStatus::Ok, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: OutcomeStatus::Error, message: message.into() }
    }

    pub fn reading(message: impl Into<String>) -> Self {
        Self { status: OutcomeStatus::Reading, message: message.into() }
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}
