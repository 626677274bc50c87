//! Pixel format and frame size negotiation
//!
//! Drivers are free to substitute their own values for anything requested, so every
//! negotiation reports what the driver confirmed rather than what was asked for.

use std::convert::TryFrom;
use std::io;

use log::debug;

use crate::buffer::Type;
use crate::error::{Error, Result};
use crate::format::{Description, Format, FourCC};
use crate::framesize::FrameSize;
use crate::handle::{self, Handle};
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// Whether the driver signalled the end of an indexed enumeration
fn exhausted(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EINVAL)
}

/// Lazy enumeration of the pixel formats of one buffer type
///
/// Entries come in driver order and may repeat.
pub struct Formats<'a, H: Handle + ?Sized> {
    handle: &'a H,
    buf_type: Type,
    index: u32,
    done: bool,
}

impl<'a, H: Handle + ?Sized> Formats<'a, H> {
    pub(crate) fn new(handle: &'a H, buf_type: Type) -> Self {
        Formats {
            handle,
            buf_type,
            index: 0,
            done: false,
        }
    }
}

impl<'a, H: Handle + ?Sized> Iterator for Formats<'a, H> {
    type Item = Result<Description>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let query = v4l2_fmtdesc {
            index: self.index,
            type_: self.buf_type as u32,
            ..Default::default()
        };
        match handle::xfer(self.handle, vidioc::VIDIOC_ENUM_FMT, &query) {
            Ok(desc) => {
                self.index += 1;
                Some(Ok(Description::from(desc)))
            }
            Err(e) => {
                self.done = true;
                if exhausted(&e) {
                    None
                } else {
                    Some(Err(Error::DeviceControl {
                        op: "VIDIOC_ENUM_FMT",
                        source: e,
                    }))
                }
            }
        }
    }
}

impl<'a, H: Handle + ?Sized> std::iter::FusedIterator for Formats<'a, H> {}

/// Lazy enumeration of the frame sizes supported for one pixel format
pub struct FrameSizes<'a, H: Handle + ?Sized> {
    handle: &'a H,
    fourcc: FourCC,
    index: u32,
    done: bool,
}

impl<'a, H: Handle + ?Sized> FrameSizes<'a, H> {
    pub(crate) fn new(handle: &'a H, fourcc: FourCC) -> Self {
        FrameSizes {
            handle,
            fourcc,
            index: 0,
            done: false,
        }
    }
}

impl<'a, H: Handle + ?Sized> Iterator for FrameSizes<'a, H> {
    type Item = Result<FrameSize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let query = v4l2_frmsizeenum::request(self.index, self.fourcc.into());
        match handle::xfer(self.handle, vidioc::VIDIOC_ENUM_FRAMESIZES, &query) {
            Ok(desc) => {
                self.index += 1;
                Some(Ok(FrameSize::from(desc)))
            }
            Err(e) => {
                self.done = true;
                if exhausted(&e) {
                    None
                } else {
                    Some(Err(Error::DeviceControl {
                        op: "VIDIOC_ENUM_FRAMESIZES",
                        source: e,
                    }))
                }
            }
        }
    }
}

impl<'a, H: Handle + ?Sized> std::iter::FusedIterator for FrameSizes<'a, H> {}

fn get_raw<H: Handle + ?Sized>(handle: &H, buf_type: Type) -> Result<v4l2_format> {
    handle::xfer(
        handle,
        vidioc::VIDIOC_G_FMT,
        &v4l2_format::empty(buf_type as u32),
    )
    .map_err(|source| Error::DeviceControl {
        op: "VIDIOC_G_FMT",
        source,
    })
}

fn set_raw<H: Handle + ?Sized>(handle: &H, fmt: &v4l2_format, fourcc: FourCC) -> Result<v4l2_format> {
    handle::xfer(handle, vidioc::VIDIOC_S_FMT, fmt).map_err(|source| {
        if exhausted(&source) {
            Error::UnsupportedFormat(fourcc)
        } else {
            Error::DeviceControl {
                op: "VIDIOC_S_FMT",
                source,
            }
        }
    })
}

fn confirmed(fmt: v4l2_format) -> Result<Format> {
    Format::try_from(fmt).map_err(|typ| Error::DeviceControl {
        op: "VIDIOC_G_FMT",
        source: io::Error::new(
            io::ErrorKind::InvalidData,
            format!("buffer type {} carries no pixel format", typ),
        ),
    })
}

/// Returns the current format of the given buffer type
pub(crate) fn get<H: Handle + ?Sized>(handle: &H, buf_type: Type) -> Result<Format> {
    confirmed(get_raw(handle, buf_type)?)
}

/// Requests a format and returns the one the driver settled on
pub(crate) fn set<H: Handle + ?Sized>(handle: &H, buf_type: Type, format: &Format) -> Result<Format> {
    let mut fmt = v4l2_format::empty(buf_type as u32);
    format.apply(&mut fmt);

    let format = confirmed(set_raw(handle, &fmt, format.fourcc)?)?;
    debug!(
        "{}: negotiated {} {}x{}",
        buf_type, format.fourcc, format.width, format.height
    );
    Ok(format)
}

/// Negotiates a memory-to-memory conversion
///
/// The request is applied to the output plane on top of its current format. The driver
/// derives the capture plane from it, and that capture format is returned.
pub(crate) fn set_m2m<H: Handle + ?Sized>(
    handle: &H,
    output: Type,
    capture: Type,
    format: &Format,
) -> Result<Format> {
    let mut fmt = get_raw(handle, output)?;
    format.apply(&mut fmt);
    set_raw(handle, &fmt, format.fourcc)?;

    let format = get(handle, capture)?;
    debug!(
        "{}: driver derived {} {}x{}",
        capture, format.fourcc, format.width, format.height
    );
    Ok(format)
}
