//! Control record codec
//!
//! Every record exchanged with the driver is modelled as a plain Rust value with explicit
//! encode/decode routines to and from the flat byte block the kernel expects. Unions are
//! modelled as enums selected by the record's leading tag (buffer type, frame size type or
//! memory type), never by reinterpreting memory.
//!
//! The names follow `linux/videodev2.h` so they can be looked up directly.
#![allow(non_camel_case_types)]

use crate::v4l2::layout::*;

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_BUF_TYPE_VIDEO_OUTPUT: u32 = 2;
pub const V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE: u32 = 9;
pub const V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE: u32 = 10;

pub const V4L2_MEMORY_MMAP: u32 = 1;
pub const V4L2_MEMORY_USERPTR: u32 = 2;
pub const V4L2_MEMORY_DMABUF: u32 = 4;

pub const V4L2_FIELD_ANY: u32 = 0;

pub const V4L2_FRMSIZE_TYPE_DISCRETE: u32 = 1;
pub const V4L2_FRMSIZE_TYPE_CONTINUOUS: u32 = 2;
pub const V4L2_FRMSIZE_TYPE_STEPWISE: u32 = 3;

pub const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0000_0001;
pub const V4L2_CTRL_FLAG_NEXT_CTRL: u32 = 0x8000_0000;
pub const V4L2_CTRL_FLAG_NEXT_COMPOUND: u32 = 0x4000_0000;

pub const V4L2_CAP_TIMEPERFRAME: u32 = 0x1000;

/// Whether buffers and formats of this type use the multi-planar layout
pub fn is_multiplanar(typ: u32) -> bool {
    typ == V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE || typ == V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE
}

/// A fixed-layout record understood by the device control channel
pub trait Record: Sized {
    /// Size of the encoded record in bytes
    const SIZE: usize;

    /// Writes the record into `buf`, which is at least `SIZE` bytes and zero-initialized
    fn encode(&self, buf: &mut [u8]);

    /// Reads the record back from `buf`, which is at least `SIZE` bytes
    fn decode(buf: &[u8]) -> Self;

    /// Returns a freshly allocated, encoded block
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.encode(&mut buf);
        buf
    }
}

/// Argument of `VIDIOC_STREAMON` and `VIDIOC_STREAMOFF`: the buffer type as C int
impl Record for u32 {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, *self);
    }

    fn decode(buf: &[u8]) -> Self {
        get_u32(buf, 0)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct v4l2_capability {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
}

impl Record for v4l2_capability {
    const SIZE: usize = 104;

    fn encode(&self, buf: &mut [u8]) {
        put_cstr(buf, 0, 16, &self.driver);
        put_cstr(buf, 16, 32, &self.card);
        put_cstr(buf, 48, 32, &self.bus_info);
        put_u32(buf, 80, self.version);
        put_u32(buf, 84, self.capabilities);
        put_u32(buf, 88, self.device_caps);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            driver: get_cstr(buf, 0, 16),
            card: get_cstr(buf, 16, 32),
            bus_info: get_cstr(buf, 48, 32),
            version: get_u32(buf, 80),
            capabilities: get_u32(buf, 84),
            device_caps: get_u32(buf, 88),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct v4l2_fmtdesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: String,
    pub pixelformat: u32,
    pub mbus_code: u32,
}

impl Record for v4l2_fmtdesc {
    const SIZE: usize = 64;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.index);
        put_u32(buf, 4, self.type_);
        put_u32(buf, 8, self.flags);
        put_cstr(buf, 12, 32, &self.description);
        put_u32(buf, 44, self.pixelformat);
        put_u32(buf, 48, self.mbus_code);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            index: get_u32(buf, 0),
            type_: get_u32(buf, 4),
            flags: get_u32(buf, 8),
            description: get_cstr(buf, 12, 32),
            pixelformat: get_u32(buf, 44),
            mbus_code: get_u32(buf, 48),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_frmsize_discrete {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_frmsize_stepwise {
    pub min_width: u32,
    pub max_width: u32,
    pub step_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub step_height: u32,
}

impl v4l2_frmsize_stepwise {
    fn encode(&self, buf: &mut [u8], off: usize) {
        put_u32(buf, off, self.min_width);
        put_u32(buf, off + 4, self.max_width);
        put_u32(buf, off + 8, self.step_width);
        put_u32(buf, off + 12, self.min_height);
        put_u32(buf, off + 16, self.max_height);
        put_u32(buf, off + 20, self.step_height);
    }

    fn decode(buf: &[u8], off: usize) -> Self {
        Self {
            min_width: get_u32(buf, off),
            max_width: get_u32(buf, off + 4),
            step_width: get_u32(buf, off + 8),
            min_height: get_u32(buf, off + 12),
            max_height: get_u32(buf, off + 16),
            step_height: get_u32(buf, off + 20),
        }
    }
}

/// Union of `struct v4l2_frmsizeenum`, selected by its `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum v4l2_frmsize {
    Discrete(v4l2_frmsize_discrete),
    Stepwise(v4l2_frmsize_stepwise),
    Continuous(v4l2_frmsize_stepwise),
    /// Any other tag; the payload is not interpreted. A tag of zero is used for requests.
    Other(u32),
}

impl v4l2_frmsize {
    pub fn tag(&self) -> u32 {
        match self {
            Self::Discrete(_) => V4L2_FRMSIZE_TYPE_DISCRETE,
            Self::Stepwise(_) => V4L2_FRMSIZE_TYPE_STEPWISE,
            Self::Continuous(_) => V4L2_FRMSIZE_TYPE_CONTINUOUS,
            Self::Other(typ) => *typ,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_frmsizeenum {
    pub index: u32,
    pub pixel_format: u32,
    pub size: v4l2_frmsize,
}

impl v4l2_frmsizeenum {
    /// Returns the request for the frame size at `index` of `pixel_format`
    pub fn request(index: u32, pixel_format: u32) -> Self {
        Self {
            index,
            pixel_format,
            size: v4l2_frmsize::Other(0),
        }
    }
}

impl Record for v4l2_frmsizeenum {
    const SIZE: usize = 44;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.index);
        put_u32(buf, 4, self.pixel_format);
        put_u32(buf, 8, self.size.tag());
        match &self.size {
            v4l2_frmsize::Discrete(discrete) => {
                put_u32(buf, 12, discrete.width);
                put_u32(buf, 16, discrete.height);
            }
            v4l2_frmsize::Stepwise(stepwise) | v4l2_frmsize::Continuous(stepwise) => {
                stepwise.encode(buf, 12)
            }
            v4l2_frmsize::Other(_) => {}
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let size = match get_u32(buf, 8) {
            V4L2_FRMSIZE_TYPE_DISCRETE => v4l2_frmsize::Discrete(v4l2_frmsize_discrete {
                width: get_u32(buf, 12),
                height: get_u32(buf, 16),
            }),
            V4L2_FRMSIZE_TYPE_STEPWISE => {
                v4l2_frmsize::Stepwise(v4l2_frmsize_stepwise::decode(buf, 12))
            }
            V4L2_FRMSIZE_TYPE_CONTINUOUS => {
                v4l2_frmsize::Continuous(v4l2_frmsize_stepwise::decode(buf, 12))
            }
            typ => v4l2_frmsize::Other(typ),
        };

        Self {
            index: get_u32(buf, 0),
            pixel_format: get_u32(buf, 4),
            size,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

impl v4l2_pix_format {
    fn encode(&self, buf: &mut [u8], off: usize) {
        put_u32(buf, off, self.width);
        put_u32(buf, off + 4, self.height);
        put_u32(buf, off + 8, self.pixelformat);
        put_u32(buf, off + 12, self.field);
        put_u32(buf, off + 16, self.bytesperline);
        put_u32(buf, off + 20, self.sizeimage);
        put_u32(buf, off + 24, self.colorspace);
        put_u32(buf, off + 28, self.priv_);
        put_u32(buf, off + 32, self.flags);
        put_u32(buf, off + 36, self.ycbcr_enc);
        put_u32(buf, off + 40, self.quantization);
        put_u32(buf, off + 44, self.xfer_func);
    }

    fn decode(buf: &[u8], off: usize) -> Self {
        Self {
            width: get_u32(buf, off),
            height: get_u32(buf, off + 4),
            pixelformat: get_u32(buf, off + 8),
            field: get_u32(buf, off + 12),
            bytesperline: get_u32(buf, off + 16),
            sizeimage: get_u32(buf, off + 20),
            colorspace: get_u32(buf, off + 24),
            priv_: get_u32(buf, off + 28),
            flags: get_u32(buf, off + 32),
            ycbcr_enc: get_u32(buf, off + 36),
            quantization: get_u32(buf, off + 40),
            xfer_func: get_u32(buf, off + 44),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_plane_pix_format {
    pub sizeimage: u32,
    pub bytesperline: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_pix_format_mplane {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub colorspace: u32,
    pub plane_fmt: [v4l2_plane_pix_format; VIDEO_MAX_PLANES],
    pub num_planes: u8,
    pub flags: u8,
    pub ycbcr_enc: u8,
    pub quantization: u8,
    pub xfer_func: u8,
}

impl v4l2_pix_format_mplane {
    const PLANE_FMT: usize = 20;
    const PLANE_FMT_SIZE: usize = 20;
    const TAIL: usize = Self::PLANE_FMT + VIDEO_MAX_PLANES * Self::PLANE_FMT_SIZE;

    fn encode(&self, buf: &mut [u8], off: usize) {
        put_u32(buf, off, self.width);
        put_u32(buf, off + 4, self.height);
        put_u32(buf, off + 8, self.pixelformat);
        put_u32(buf, off + 12, self.field);
        put_u32(buf, off + 16, self.colorspace);
        for (i, plane) in self.plane_fmt.iter().enumerate() {
            let base = off + Self::PLANE_FMT + i * Self::PLANE_FMT_SIZE;
            put_u32(buf, base, plane.sizeimage);
            put_u32(buf, base + 4, plane.bytesperline);
        }
        put_u8(buf, off + Self::TAIL, self.num_planes);
        put_u8(buf, off + Self::TAIL + 1, self.flags);
        put_u8(buf, off + Self::TAIL + 2, self.ycbcr_enc);
        put_u8(buf, off + Self::TAIL + 3, self.quantization);
        put_u8(buf, off + Self::TAIL + 4, self.xfer_func);
    }

    fn decode(buf: &[u8], off: usize) -> Self {
        let mut plane_fmt = [v4l2_plane_pix_format::default(); VIDEO_MAX_PLANES];
        for (i, plane) in plane_fmt.iter_mut().enumerate() {
            let base = off + Self::PLANE_FMT + i * Self::PLANE_FMT_SIZE;
            plane.sizeimage = get_u32(buf, base);
            plane.bytesperline = get_u32(buf, base + 4);
        }

        Self {
            width: get_u32(buf, off),
            height: get_u32(buf, off + 4),
            pixelformat: get_u32(buf, off + 8),
            field: get_u32(buf, off + 12),
            colorspace: get_u32(buf, off + 16),
            plane_fmt,
            num_planes: get_u8(buf, off + Self::TAIL),
            flags: get_u8(buf, off + Self::TAIL + 1),
            ycbcr_enc: get_u8(buf, off + Self::TAIL + 2),
            quantization: get_u8(buf, off + Self::TAIL + 3),
            xfer_func: get_u8(buf, off + Self::TAIL + 4),
        }
    }
}

/// The `fmt` union of `struct v4l2_format`, selected by the buffer type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum v4l2_format_union {
    Pix(v4l2_pix_format),
    PixMp(v4l2_pix_format_mplane),
    /// Buffer types this crate does not interpret; the raw union bytes are preserved
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct v4l2_format {
    pub type_: u32,
    pub fmt: v4l2_format_union,
}

impl v4l2_format {
    /// Returns an empty format record of the given buffer type, suitable for `VIDIOC_G_FMT`
    pub fn empty(type_: u32) -> Self {
        let fmt = if is_multiplanar(type_) {
            v4l2_format_union::PixMp(v4l2_pix_format_mplane::default())
        } else if type_ == V4L2_BUF_TYPE_VIDEO_CAPTURE || type_ == V4L2_BUF_TYPE_VIDEO_OUTPUT {
            v4l2_format_union::Pix(v4l2_pix_format::default())
        } else {
            v4l2_format_union::Raw(vec![0; FORMAT_UNION_SIZE])
        };
        Self { type_, fmt }
    }
}

impl Record for v4l2_format {
    const SIZE: usize = FORMAT_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.type_);
        match &self.fmt {
            v4l2_format_union::Pix(pix) => pix.encode(buf, FORMAT_UNION),
            v4l2_format_union::PixMp(pix_mp) => pix_mp.encode(buf, FORMAT_UNION),
            v4l2_format_union::Raw(raw) => {
                let n = raw.len().min(FORMAT_UNION_SIZE);
                buf[FORMAT_UNION..FORMAT_UNION + n].copy_from_slice(&raw[..n]);
            }
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let type_ = get_u32(buf, 0);
        let fmt = if is_multiplanar(type_) {
            v4l2_format_union::PixMp(v4l2_pix_format_mplane::decode(buf, FORMAT_UNION))
        } else if type_ == V4L2_BUF_TYPE_VIDEO_CAPTURE || type_ == V4L2_BUF_TYPE_VIDEO_OUTPUT {
            v4l2_format_union::Pix(v4l2_pix_format::decode(buf, FORMAT_UNION))
        } else {
            v4l2_format_union::Raw(buf[FORMAT_UNION..FORMAT_UNION + FORMAT_UNION_SIZE].to_vec())
        };
        Self { type_, fmt }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
}

impl Record for v4l2_requestbuffers {
    const SIZE: usize = 20;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.count);
        put_u32(buf, 4, self.type_);
        put_u32(buf, 8, self.memory);
        put_u32(buf, 12, self.capabilities);
        put_u8(buf, 16, self.flags);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            count: get_u32(buf, 0),
            type_: get_u32(buf, 4),
            memory: get_u32(buf, 8),
            capabilities: get_u32(buf, 12),
            flags: get_u8(buf, 16),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_timeval {
    pub tv_sec: i64,
    pub tv_usec: i64,
}

/// The `m` union of `struct v4l2_buffer`
///
/// Which member is valid depends on the memory type and on whether the buffer type is
/// multi-planar. For multi-planar buffers the union carries the address of a caller-owned
/// plane array; that array must outlive the control call it is passed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum v4l2_buffer_m {
    Offset(u32),
    UserPtr(usize),
    Planes(usize),
    Fd(i32),
}

impl Default for v4l2_buffer_m {
    fn default() -> Self {
        Self::Offset(0)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: v4l2_timeval,
    pub sequence: u32,
    pub memory: u32,
    pub m: v4l2_buffer_m,
    /// Buffer size in bytes, or the number of plane descriptors for multi-planar buffers
    pub length: u32,
    pub request_fd: i32,
}

impl Record for v4l2_buffer {
    const SIZE: usize = BUFFER_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.index);
        put_u32(buf, 4, self.type_);
        put_u32(buf, 8, self.bytesused);
        put_u32(buf, 12, self.flags);
        put_u32(buf, 16, self.field);
        put_word(buf, BUFFER_TIMESTAMP, self.timestamp.tv_sec as usize);
        put_word(buf, BUFFER_TIMESTAMP + PTR_SIZE, self.timestamp.tv_usec as usize);
        put_u32(buf, BUFFER_SEQUENCE, self.sequence);
        put_u32(buf, BUFFER_MEMORY, self.memory);
        match self.m {
            v4l2_buffer_m::Offset(offset) => put_u32(buf, BUFFER_M, offset),
            v4l2_buffer_m::UserPtr(ptr) | v4l2_buffer_m::Planes(ptr) => {
                put_word(buf, BUFFER_M, ptr)
            }
            v4l2_buffer_m::Fd(fd) => put_i32(buf, BUFFER_M, fd),
        }
        put_u32(buf, BUFFER_LENGTH, self.length);
        put_i32(buf, BUFFER_REQUEST_FD, self.request_fd);
    }

    fn decode(buf: &[u8]) -> Self {
        let type_ = get_u32(buf, 4);
        let memory = get_u32(buf, BUFFER_MEMORY);
        let m = if is_multiplanar(type_) {
            v4l2_buffer_m::Planes(get_word(buf, BUFFER_M))
        } else {
            match memory {
                V4L2_MEMORY_USERPTR => v4l2_buffer_m::UserPtr(get_word(buf, BUFFER_M)),
                V4L2_MEMORY_DMABUF => v4l2_buffer_m::Fd(get_i32(buf, BUFFER_M)),
                _ => v4l2_buffer_m::Offset(get_u32(buf, BUFFER_M)),
            }
        };

        Self {
            index: get_u32(buf, 0),
            type_,
            bytesused: get_u32(buf, 8),
            flags: get_u32(buf, 12),
            field: get_u32(buf, 16),
            timestamp: v4l2_timeval {
                tv_sec: get_word(buf, BUFFER_TIMESTAMP) as i64,
                tv_usec: get_word(buf, BUFFER_TIMESTAMP + PTR_SIZE) as i64,
            },
            sequence: get_u32(buf, BUFFER_SEQUENCE),
            memory,
            m,
            length: get_u32(buf, BUFFER_LENGTH),
            request_fd: get_i32(buf, BUFFER_REQUEST_FD),
        }
    }
}

/// Plane descriptor referenced by multi-planar buffers (`struct v4l2_plane`)
///
/// Only the `mem_offset` member of the plane's `m` union is modelled, since buffers are
/// always memory mapped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_plane {
    pub bytesused: u32,
    pub length: u32,
    pub mem_offset: u32,
    pub data_offset: u32,
}

impl Record for v4l2_plane {
    const SIZE: usize = PLANE_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.bytesused);
        put_u32(buf, 4, self.length);
        put_u32(buf, PLANE_M, self.mem_offset);
        put_u32(buf, PLANE_DATA_OFFSET, self.data_offset);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            bytesused: get_u32(buf, 0),
            length: get_u32(buf, 4),
            mem_offset: get_u32(buf, PLANE_M),
            data_offset: get_u32(buf, PLANE_DATA_OFFSET),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct v4l2_queryctrl {
    pub id: u32,
    pub type_: u32,
    pub name: String,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
}

impl Record for v4l2_queryctrl {
    const SIZE: usize = 68;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.id);
        put_u32(buf, 4, self.type_);
        put_cstr(buf, 8, 32, &self.name);
        put_i32(buf, 40, self.minimum);
        put_i32(buf, 44, self.maximum);
        put_i32(buf, 48, self.step);
        put_i32(buf, 52, self.default_value);
        put_u32(buf, 56, self.flags);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            id: get_u32(buf, 0),
            type_: get_u32(buf, 4),
            name: get_cstr(buf, 8, 32),
            minimum: get_i32(buf, 40),
            maximum: get_i32(buf, 44),
            step: get_i32(buf, 48),
            default_value: get_i32(buf, 52),
            flags: get_u32(buf, 56),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_control {
    pub id: u32,
    pub value: i32,
}

impl Record for v4l2_control {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.id);
        put_i32(buf, 4, self.value);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            id: get_u32(buf, 0),
            value: get_i32(buf, 4),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_fract {
    pub numerator: u32,
    pub denominator: u32,
}

/// `struct v4l2_captureparm` and `struct v4l2_outputparm` share this layout
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_streamparm_data {
    pub capability: u32,
    /// `capturemode` or `outputmode`
    pub mode: u32,
    pub timeperframe: v4l2_fract,
    pub extendedmode: u32,
    /// `readbuffers` or `writebuffers`
    pub buffers: u32,
}

impl v4l2_streamparm_data {
    fn encode(&self, buf: &mut [u8], off: usize) {
        put_u32(buf, off, self.capability);
        put_u32(buf, off + 4, self.mode);
        put_u32(buf, off + 8, self.timeperframe.numerator);
        put_u32(buf, off + 12, self.timeperframe.denominator);
        put_u32(buf, off + 16, self.extendedmode);
        put_u32(buf, off + 20, self.buffers);
    }

    fn decode(buf: &[u8], off: usize) -> Self {
        Self {
            capability: get_u32(buf, off),
            mode: get_u32(buf, off + 4),
            timeperframe: v4l2_fract {
                numerator: get_u32(buf, off + 8),
                denominator: get_u32(buf, off + 12),
            },
            extendedmode: get_u32(buf, off + 16),
            buffers: get_u32(buf, off + 20),
        }
    }
}

/// The `parm` union of `struct v4l2_streamparm`, selected by the buffer type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum v4l2_streamparm_union {
    Capture(v4l2_streamparm_data),
    Output(v4l2_streamparm_data),
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct v4l2_streamparm {
    pub type_: u32,
    pub parm: v4l2_streamparm_union,
}

impl v4l2_streamparm {
    /// Returns a stream parameter record of the given buffer type with zeroed parameters
    pub fn empty(type_: u32) -> Self {
        let data = v4l2_streamparm_data::default();
        let parm = match type_ {
            V4L2_BUF_TYPE_VIDEO_CAPTURE | V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE => {
                v4l2_streamparm_union::Capture(data)
            }
            V4L2_BUF_TYPE_VIDEO_OUTPUT | V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE => {
                v4l2_streamparm_union::Output(data)
            }
            _ => v4l2_streamparm_union::Raw(vec![0; STREAMPARM_UNION_SIZE]),
        };
        Self { type_, parm }
    }

    /// Returns the capture or output parameters, if the record carries either
    pub fn data(&self) -> Option<&v4l2_streamparm_data> {
        match &self.parm {
            v4l2_streamparm_union::Capture(data) | v4l2_streamparm_union::Output(data) => {
                Some(data)
            }
            v4l2_streamparm_union::Raw(_) => None,
        }
    }
}

impl Record for v4l2_streamparm {
    const SIZE: usize = 4 + STREAMPARM_UNION_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.type_);
        match &self.parm {
            v4l2_streamparm_union::Capture(data) | v4l2_streamparm_union::Output(data) => {
                data.encode(buf, 4)
            }
            v4l2_streamparm_union::Raw(raw) => {
                let n = raw.len().min(STREAMPARM_UNION_SIZE);
                buf[4..4 + n].copy_from_slice(&raw[..n]);
            }
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let mut parm = Self::empty(get_u32(buf, 0));
        parm.parm = match parm.parm {
            v4l2_streamparm_union::Capture(_) => {
                v4l2_streamparm_union::Capture(v4l2_streamparm_data::decode(buf, 4))
            }
            v4l2_streamparm_union::Output(_) => {
                v4l2_streamparm_union::Output(v4l2_streamparm_data::decode(buf, 4))
            }
            v4l2_streamparm_union::Raw(_) => {
                v4l2_streamparm_union::Raw(buf[4..4 + STREAMPARM_UNION_SIZE].to_vec())
            }
        };
        parm
    }
}
