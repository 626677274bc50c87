use std::{convert::TryFrom, fmt};

use crate::v4l2::videodev::{
    v4l2_format, v4l2_format_union, v4l2_pix_format, v4l2_pix_format_mplane,
};

pub mod description;
pub use description::Description;

pub mod field;
pub use field::FieldOrder;

pub mod fourcc;
pub use fourcc::FourCC;

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
    pub struct Flags : u32 {
        const PREMUL_ALPHA  = 0x00000001;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<u8> for Flags {
    fn from(flags: u8) -> Self {
        Self::from_bits_retain(flags as u32)
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

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Streaming format as confirmed by the driver
///
/// Multi-planar formats are folded into this view: `stride` and `size` describe the first
/// plane and `num_planes` tells how many there are.
pub struct Format {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// pixelformat code
    pub fourcc: FourCC,
    /// field order for interlacing
    pub field_order: FieldOrder,

    /// bytes per line
    pub stride: u32,
    /// maximum number of bytes required to store an image
    pub size: u32,

    /// flags set by the application or driver
    pub flags: Flags,

    /// number of planes, 1 for single-planar formats
    pub num_planes: u8,
}

impl Format {
    /// Returns a capture format
    ///
    /// # Arguments
    ///
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `fourcc` - Four character code (pixelformat)
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::{Format, FourCC};
    /// let fmt = Format::new(640, 480, FourCC::new(b"YUYV"));
    /// ```
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Format {
            width,
            height,
            fourcc,
            field_order: FieldOrder::Any,
            stride: 0,
            size: 0,
            flags: Flags::empty(),
            num_planes: 1,
        }
    }

    /// Returns the negotiated triple of pixel format, width and height
    pub fn triple(&self) -> (FourCC, u32, u32) {
        (self.fourcc, self.width, self.height)
    }

    /// Overwrites the request fields of a format record, keeping everything else
    pub(crate) fn apply(&self, fmt: &mut v4l2_format) {
        match &mut fmt.fmt {
            v4l2_format_union::Pix(pix) => {
                pix.width = self.width;
                pix.height = self.height;
                pix.pixelformat = self.fourcc.into();
                pix.field = self.field_order.into();
            }
            v4l2_format_union::PixMp(pix_mp) => {
                pix_mp.width = self.width;
                pix_mp.height = self.height;
                pix_mp.pixelformat = self.fourcc.into();
                pix_mp.field = self.field_order.into();
            }
            v4l2_format_union::Raw(_) => {}
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "width          : {}", self.width)?;
        writeln!(f, "height         : {}", self.height)?;
        writeln!(f, "fourcc         : {}", self.fourcc)?;
        writeln!(f, "field          : {}", self.field_order)?;
        writeln!(f, "stride         : {}", self.stride)?;
        writeln!(f, "size           : {}", self.size)?;
        writeln!(f, "planes         : {}", self.num_planes)?;
        Ok(())
    }
}

impl From<v4l2_pix_format> for Format {
    fn from(fmt: v4l2_pix_format) -> Self {
        Self {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.pixelformat),
            field_order: FieldOrder::from(fmt.field),
            stride: fmt.bytesperline,
            size: fmt.sizeimage,
            flags: Flags::from(fmt.flags),
            num_planes: 1,
        }
    }
}

impl From<v4l2_pix_format_mplane> for Format {
    fn from(fmt: v4l2_pix_format_mplane) -> Self {
        Self {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.pixelformat),
            field_order: FieldOrder::from(fmt.field),
            stride: fmt.plane_fmt[0].bytesperline,
            size: fmt.plane_fmt[0].sizeimage,
            flags: Flags::from(fmt.flags),
            num_planes: fmt.num_planes,
        }
    }
}

impl TryFrom<v4l2_format> for Format {
    type Error = u32;

    /// Fails with the buffer type if the record carries no pixel format
    fn try_from(fmt: v4l2_format) -> Result<Self, Self::Error> {
        match fmt.fmt {
            v4l2_format_union::Pix(pix) => Ok(Format::from(pix)),
            v4l2_format_union::PixMp(pix_mp) => Ok(Format::from(pix_mp)),
            v4l2_format_union::Raw(_) => Err(fmt.type_),
        }
    }
}
