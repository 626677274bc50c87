use std::fmt;

use crate::fraction::Fraction;
use crate::v4l2::videodev::v4l2_streamparm_data;

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
    pub struct Capabilities: u32 {
        const TIME_PER_FRAME    = 0x1000;
    }
}

impl From<u32> for Capabilities {
    fn from(caps: u32) -> Self {
        Self::from_bits_retain(caps)
    }
}

impl From<Capabilities> for u32 {
    fn from(capabilities: Capabilities) -> Self {
        capabilities.bits()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
    pub struct Modes: u32 {
        const HIGH_QUALITY      = 0x0001;
    }
}

impl From<u32> for Modes {
    fn from(modes: u32) -> Self {
        Self::from_bits_retain(modes)
    }
}

impl fmt::Display for Modes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Streaming parameters (single-planar)
pub struct Parameters {
    pub capabilities: Capabilities,
    pub modes: Modes,
    /// Time between two frames
    pub interval: Fraction,
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "capabilities : {}", self.capabilities)?;
        writeln!(f, "modes        : {}", self.modes)?;
        writeln!(f, "interval     : {} [s]", self.interval)?;
        Ok(())
    }
}

impl From<v4l2_streamparm_data> for Parameters {
    fn from(params: v4l2_streamparm_data) -> Self {
        Self {
            capabilities: Capabilities::from(params.capability),
            modes: Modes::from(params.mode),
            interval: Fraction::from(params.timeperframe),
        }
    }
}
