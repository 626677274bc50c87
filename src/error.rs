use std::path::PathBuf;
use std::{error, fmt, io};

use crate::buffer::State;
use crate::format::FourCC;

/// Errors reported by device, buffer and stream operations
#[derive(Debug)]
pub enum Error {
    /// The device node could not be opened
    OpenFailed { path: PathBuf, source: io::Error },

    /// The device lacks the video capture capability
    NotCaptureDevice,

    /// The device lacks the memory-to-memory capability
    NotM2MDevice,

    /// The device does not support the streaming I/O method
    StreamingUnsupported,

    /// The driver rejected the requested pixel format
    UnsupportedFormat(FourCC),

    /// Querying or mapping the buffer at `index` failed
    BufferMapError { index: u32, source: io::Error },

    /// The operation is not allowed while streaming
    AlreadyStreaming,

    /// The operation requires an active stream
    NotStreaming,

    /// The time-per-frame fraction cannot be expressed as a framerate
    InvalidFramerate { numerator: u32, denominator: u32 },

    /// Reading or writing a control failed
    ControlAccessError { id: u32, source: io::Error },

    /// A device control call failed; `op` names the request
    DeviceControl { op: &'static str, source: io::Error },

    /// The buffer index is outside the pool
    BufferIndex(u32),

    /// The buffer is not in a state that permits the operation
    BufferState { index: u32, state: State },

    /// The operation does not apply to the device's mode (capture or memory-to-memory)
    WrongMode,

    /// Any other I/O error
    Io(io::Error),
}

/// Result alias used throughout this crate
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OpenFailed { path, source } => {
                write!(f, "cannot open {}: {}", path.display(), source)
            }
            Error::NotCaptureDevice => write!(f, "not a video capture device"),
            Error::NotM2MDevice => write!(f, "not a video memory-to-memory device"),
            Error::StreamingUnsupported => {
                write!(f, "device does not support the streaming I/O method")
            }
            Error::UnsupportedFormat(fourcc) => write!(f, "unsupported pixel format {}", fourcc),
            Error::BufferMapError { index, source } => {
                write!(f, "failed to map buffer {}: {}", index, source)
            }
            Error::AlreadyStreaming => write!(f, "already streaming"),
            Error::NotStreaming => write!(f, "not streaming"),
            Error::InvalidFramerate {
                numerator,
                denominator,
            } => write!(f, "invalid framerate ({}/{})", denominator, numerator),
            Error::ControlAccessError { id, source } => {
                write!(f, "cannot access control {:#010x}: {}", id, source)
            }
            Error::DeviceControl { op, source } => write!(f, "{} failed: {}", op, source),
            Error::BufferIndex(index) => write!(f, "no buffer with index {}", index),
            Error::BufferState { index, state } => {
                write!(f, "buffer {} is {}", index, state)
            }
            Error::WrongMode => write!(f, "operation does not apply to this device mode"),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::OpenFailed { source, .. }
            | Error::BufferMapError { source, .. }
            | Error::ControlAccessError { source, .. }
            | Error::DeviceControl { source, .. } => Some(source),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl Error {
    /// Returns the OS error code carried by this error, if any
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::OpenFailed { source, .. }
            | Error::BufferMapError { source, .. }
            | Error::ControlAccessError { source, .. }
            | Error::DeviceControl { source, .. }
            | Error::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }
}
