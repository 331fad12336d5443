use std::fmt;
use std::io;
use thiserror::Error;

/// The filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Open,
    Stat,
    Seek,
    Read,
    Write,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            IoOp::Open => "open",
            IoOp::Stat => "determine the length of",
            IoOp::Seek => "seek in",
            IoOp::Read => "read",
            IoOp::Write => "write",
        };
        f.write_str(verb)
    }
}

/// Fieldless discriminant of `OverjoinError`, for callers that branch on the
/// kind of failure without matching on its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ZeroWindow,
    WindowExceedsBuffer,
    InputTooShort,
    EndOfScan,
    Io,
}

impl ErrorCode {
    /// Generic description of the error kind.
    pub fn describe(self) -> &'static str {
        match self {
            ErrorCode::ZeroWindow => "window length is zero",
            ErrorCode::WindowExceedsBuffer => "window length exceeds buffer capacity",
            ErrorCode::InputTooShort => "input shorter than the window",
            ErrorCode::EndOfScan => "advanced past end of file",
            ErrorCode::Io => "I/O failure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Errors raised while searching for or writing a join.
///
/// Not finding an overlap is not an error; see `SearchOutcome`.
#[derive(Error, Debug)]
pub enum OverjoinError {
    #[error("Invalid window length: must be at least 1 byte")]
    ZeroWindow,

    #[error("Window length {window} exceeds buffer capacity {capacity}")]
    WindowExceedsBuffer { window: usize, capacity: usize },

    #[error("{name} is {length} bytes long, shorter than the {window}-byte window")]
    InputTooShort {
        name: String,
        length: u64,
        window: usize,
    },

    /// A cursor was advanced while already at end of file.
    #[error("Cannot advance past the end of {name}")]
    EndOfScan { name: String },

    #[error("Failed to {op} {name}")]
    Io {
        op: IoOp,
        name: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, OverjoinError>;

impl OverjoinError {
    pub(crate) fn io(op: IoOp, name: impl Into<String>, source: io::Error) -> Self {
        OverjoinError::Io {
            op,
            name: name.into(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            OverjoinError::ZeroWindow => ErrorCode::ZeroWindow,
            OverjoinError::WindowExceedsBuffer { .. } => ErrorCode::WindowExceedsBuffer,
            OverjoinError::InputTooShort { .. } => ErrorCode::InputTooShort,
            OverjoinError::EndOfScan { .. } => ErrorCode::EndOfScan,
            OverjoinError::Io { .. } => ErrorCode::Io,
        }
    }

    /// Rejected configuration, detected before any scanning.
    pub fn is_config(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::ZeroWindow | ErrorCode::WindowExceedsBuffer | ErrorCode::InputTooShort
        )
    }

    /// Underlying OS error code, when the failure came from the system.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            OverjoinError::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
