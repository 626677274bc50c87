use std::fmt;

use crate::timestamp::Timestamp;
use crate::v4l2::videodev;

/// Buffer type
///
/// Specific types of devices require buffers of corresponding types.
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    VideoCapture        = 1,
    VideoOutput         = 2,
    VideoOverlay        = 3,
    VbiCapture          = 4,
    VbiOutput           = 5,
    SlicedVbiCapture    = 6,
    SlicedVbiOutput     = 7,
    VideoOutputOverlay  = 8,
    VideoCaptureMplane  = 9,
    VideoOutputMplane   = 10,
    SdrCapture          = 11,
    SdrOutput           = 12,
    MetaCapture         = 13,
    MetaOutput          = 14,
}

impl Type {
    /// Whether buffers of this type carry their memory in plane descriptors
    pub fn is_multiplanar(self) -> bool {
        videodev::is_multiplanar(self as u32)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
    pub struct Flags: u32 {
        /// Buffer is mapped
        const MAPPED                = 0x00000001;
        /// Buffer is queued for processing
        const QUEUED                = 0x00000002;
        /// Buffer is ready
        const DONE                  = 0x00000004;
        /// Image is a keyframe (I-frame)
        const KEYFRAME              = 0x00000008;
        /// Image is a P-frame
        const PFRAME                = 0x00000010;
        /// Image is a B-frame
        const BFRAME                = 0x00000020;
        /// Buffer is ready, but the data contained within is corrupted
        const ERROR                 = 0x00000040;
        /// Timecode field is valid
        const TIMECODE              = 0x00000100;
        /// Buffer is prepared for queuing
        const PREPARED              = 0x00000400;
        /// Timestamp type
        const TIMESTAMP_MONOTONIC   = 0x00002000;
        const TIMESTAMP_COPY        = 0x00004000;
        /// mem2mem encoder/decoder
        const LAST                  = 0x00100000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Ownership state of a pooled buffer
///
/// A buffer is owned either by the driver (`Queued`) or by the consumer (`Mapped`, `Held`),
/// never both. Unmapped buffers are not part of a pool at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// Mapped into the process, not handed to the driver yet
    Mapped,
    /// Owned by the driver, which may fill or drain it at any time
    Queued,
    /// Dequeued and owned by the consumer until it is queued again
    Held,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Mapped => write!(f, "mapped"),
            State::Queued => write!(f, "queued"),
            State::Held => write!(f, "held by the consumer"),
        }
    }
}

/// Buffer metadata, mostly used not to convolute the main buffer structs
#[derive(Debug, Default, Copy, Clone)]
pub struct Metadata {
    /// Number of bytes occupied by the data in the buffer
    pub bytesused: u32,
    /// Buffer flags
    pub flags: Flags,
    /// Time of capture (usually set by the driver)
    pub timestamp: Timestamp,
    /// Sequence number, counting the frames
    pub sequence: u32,
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seq: {}, bytes: {}, ts: {}, flags: {}",
            self.sequence, self.bytesused, self.timestamp, self.flags
        )
    }
}
