use std::fmt;

use crate::format::FourCC;
use crate::v4l2::videodev::v4l2_fmtdesc;

const FMT_FLAG_COMPRESSED: u32 = 0x0001;
const FMT_FLAG_EMULATED: u32 = 0x0002;

/// One entry of a device's pixel format list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    /// Position in the driver's list
    pub index: u32,
    pub fourcc: FourCC,
    /// Human readable name chosen by the driver
    pub description: String,
    pub compressed: bool,
    /// Converted in software by the driver stack rather than produced by the hardware
    pub emulated: bool,
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fourcc, self.description)?;
        if self.compressed {
            write!(f, ", compressed")?;
        }
        if self.emulated {
            write!(f, ", emulated")?;
        }
        Ok(())
    }
}

impl From<v4l2_fmtdesc> for Description {
    fn from(desc: v4l2_fmtdesc) -> Self {
        Description {
            index: desc.index,
            fourcc: FourCC::from(desc.pixelformat),
            description: desc.description,
            compressed: desc.flags & FMT_FLAG_COMPRESSED != 0,
            emulated: desc.flags & FMT_FLAG_EMULATED != 0,
        }
    }
}
