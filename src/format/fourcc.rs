use std::{fmt, str};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
/// Four character code representing a pixelformat
///
/// Equality is by code; two formats with the same code are the same format no matter how the
/// driver describes them.
pub struct FourCC {
    pub repr: [u8; 4],
}

impl FourCC {
    /// Packed YUV 4:2:2
    pub const YUYV: FourCC = FourCC { repr: *b"YUYV" };
    /// Motion-JPEG
    pub const MJPG: FourCC = FourCC { repr: *b"MJPG" };
    /// H.264 with start codes
    pub const H264: FourCC = FourCC { repr: *b"H264" };

    #[allow(clippy::trivially_copy_pass_by_ref)]
    /// Returns a pixelformat as four character code
    ///
    /// # Arguments
    ///
    /// * `repr` - Four characters as raw bytes
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::FourCC;
    /// let fourcc = FourCC::new(b"YUYV");
    /// ```
    pub fn new(repr: &[u8; 4]) -> FourCC {
        FourCC { repr: *repr }
    }

    /// Returns the string representation of a four character code
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::FourCC;
    /// let fourcc = FourCC::new(b"YUYV");
    /// let str = fourcc.str().unwrap();
    /// ```
    pub fn str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.repr)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.str() {
            Ok(string) => write!(f, "{}", string),
            Err(_) => write!(f, "{:#010x}", u32::from(*self)),
        }
    }
}

impl From<u32> for FourCC {
    fn from(code: u32) -> Self {
        FourCC::new(&code.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(fourcc: FourCC) -> Self {
        Self::from_le_bytes(fourcc.repr)
    }
}
