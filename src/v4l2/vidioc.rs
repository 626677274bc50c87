use crate::v4l2::videodev::*;

#[cfg(not(target_env = "musl"))]
#[allow(non_camel_case_types)]
pub type _IOC_TYPE = std::os::raw::c_ulong;
#[cfg(target_env = "musl")]
#[allow(non_camel_case_types)]
pub type _IOC_TYPE = std::os::raw::c_int;

// linux ioctl.h
const _IOC_NRBITS: u8 = 8;
const _IOC_TYPEBITS: u8 = 8;

const _IOC_SIZEBITS: u8 = 14;

const _IOC_NRSHIFT: u8 = 0;
const _IOC_TYPESHIFT: u8 = _IOC_NRSHIFT + _IOC_NRBITS;
const _IOC_SIZESHIFT: u8 = _IOC_TYPESHIFT + _IOC_TYPEBITS;
const _IOC_DIRSHIFT: u8 = _IOC_SIZESHIFT + _IOC_SIZEBITS;

const _IOC_WRITE: u8 = 1;
const _IOC_READ: u8 = 2;

macro_rules! _IOC {
    ($dir:expr, $type:expr, $nr:expr, $size:expr) => {
        (($dir as _IOC_TYPE) << _IOC_DIRSHIFT)
            | (($type as _IOC_TYPE) << _IOC_TYPESHIFT)
            | (($nr as _IOC_TYPE) << _IOC_NRSHIFT)
            | (($size as _IOC_TYPE) << _IOC_SIZESHIFT)
    };
}

macro_rules! _IOR {
    ($type:expr, $nr:expr, $size:ty) => {
        _IOC!(_IOC_READ, $type, $nr, <$size as Record>::SIZE)
    };
}

macro_rules! _IOW {
    ($type:expr, $nr:expr, $size:ty) => {
        _IOC!(_IOC_WRITE, $type, $nr, <$size as Record>::SIZE)
    };
}

macro_rules! _IOWR {
    ($type:expr, $nr:expr, $size:ty) => {
        _IOC!(_IOC_READ | _IOC_WRITE, $type, $nr, <$size as Record>::SIZE)
    };
}

pub const VIDIOC_QUERYCAP: _IOC_TYPE = _IOR!(b'V', 0, v4l2_capability);
pub const VIDIOC_ENUM_FMT: _IOC_TYPE = _IOWR!(b'V', 2, v4l2_fmtdesc);
pub const VIDIOC_G_FMT: _IOC_TYPE = _IOWR!(b'V', 4, v4l2_format);
pub const VIDIOC_S_FMT: _IOC_TYPE = _IOWR!(b'V', 5, v4l2_format);
pub const VIDIOC_REQBUFS: _IOC_TYPE = _IOWR!(b'V', 8, v4l2_requestbuffers);
pub const VIDIOC_QUERYBUF: _IOC_TYPE = _IOWR!(b'V', 9, v4l2_buffer);
pub const VIDIOC_QBUF: _IOC_TYPE = _IOWR!(b'V', 15, v4l2_buffer);
pub const VIDIOC_DQBUF: _IOC_TYPE = _IOWR!(b'V', 17, v4l2_buffer);
pub const VIDIOC_STREAMON: _IOC_TYPE = _IOW!(b'V', 18, u32);
pub const VIDIOC_STREAMOFF: _IOC_TYPE = _IOW!(b'V', 19, u32);
pub const VIDIOC_G_PARM: _IOC_TYPE = _IOWR!(b'V', 21, v4l2_streamparm);
pub const VIDIOC_S_PARM: _IOC_TYPE = _IOWR!(b'V', 22, v4l2_streamparm);
pub const VIDIOC_G_CTRL: _IOC_TYPE = _IOWR!(b'V', 27, v4l2_control);
pub const VIDIOC_S_CTRL: _IOC_TYPE = _IOWR!(b'V', 28, v4l2_control);
pub const VIDIOC_QUERYCTRL: _IOC_TYPE = _IOWR!(b'V', 36, v4l2_queryctrl);
pub const VIDIOC_ENUM_FRAMESIZES: _IOC_TYPE = _IOWR!(b'V', 74, v4l2_frmsizeenum);

/// Returns the size of the argument record encoded in a request code
pub fn size(request: _IOC_TYPE) -> usize {
    ((request >> _IOC_SIZESHIFT) & ((1 << _IOC_SIZEBITS) - 1)) as usize
}

/// Returns the symbolic name of a request code, used in diagnostics
pub fn name(request: _IOC_TYPE) -> &'static str {
    match request {
        VIDIOC_QUERYCAP => "VIDIOC_QUERYCAP",
        VIDIOC_ENUM_FMT => "VIDIOC_ENUM_FMT",
        VIDIOC_G_FMT => "VIDIOC_G_FMT",
        VIDIOC_S_FMT => "VIDIOC_S_FMT",
        VIDIOC_REQBUFS => "VIDIOC_REQBUFS",
        VIDIOC_QUERYBUF => "VIDIOC_QUERYBUF",
        VIDIOC_QBUF => "VIDIOC_QBUF",
        VIDIOC_DQBUF => "VIDIOC_DQBUF",
        VIDIOC_STREAMON => "VIDIOC_STREAMON",
        VIDIOC_STREAMOFF => "VIDIOC_STREAMOFF",
        VIDIOC_G_PARM => "VIDIOC_G_PARM",
        VIDIOC_S_PARM => "VIDIOC_S_PARM",
        VIDIOC_G_CTRL => "VIDIOC_G_CTRL",
        VIDIOC_S_CTRL => "VIDIOC_S_CTRL",
        VIDIOC_QUERYCTRL => "VIDIOC_QUERYCTRL",
        VIDIOC_ENUM_FRAMESIZES => "VIDIOC_ENUM_FRAMESIZES",
        _ => "VIDIOC_UNKNOWN",
    }
}

// The generic _IOC encoding; a handful of architectures (powerpc, mips, sparc) use
// different direction bits and are not covered by these constants.
#[cfg(all(
    test,
    not(target_env = "musl"),
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
mod tests {
    use super::*;

    #[test]
    fn codes_match_kernel_headers() {
        assert_eq!(VIDIOC_QUERYCAP, 0x8068_5600);
        assert_eq!(VIDIOC_ENUM_FMT, 0xc040_5602);
        assert_eq!(VIDIOC_G_FMT, 0xc0d0_5604);
        assert_eq!(VIDIOC_S_FMT, 0xc0d0_5605);
        assert_eq!(VIDIOC_REQBUFS, 0xc014_5608);
        assert_eq!(VIDIOC_QUERYBUF, 0xc058_5609);
        assert_eq!(VIDIOC_QBUF, 0xc058_560f);
        assert_eq!(VIDIOC_DQBUF, 0xc058_5611);
        assert_eq!(VIDIOC_STREAMON, 0x4004_5612);
        assert_eq!(VIDIOC_STREAMOFF, 0x4004_5613);
        assert_eq!(VIDIOC_G_PARM, 0xc0cc_5615);
        assert_eq!(VIDIOC_S_PARM, 0xc0cc_5616);
        assert_eq!(VIDIOC_G_CTRL, 0xc008_561b);
        assert_eq!(VIDIOC_S_CTRL, 0xc008_561c);
        assert_eq!(VIDIOC_QUERYCTRL, 0xc044_5624);
        assert_eq!(VIDIOC_ENUM_FRAMESIZES, 0xc02c_564a);
    }

    #[test]
    fn sizes_decode_from_codes() {
        assert_eq!(size(VIDIOC_QUERYCAP), 104);
        assert_eq!(size(VIDIOC_STREAMON), 4);
        assert_eq!(size(VIDIOC_S_PARM), 204);
    }

    #[test]
    fn names_resolve() {
        assert_eq!(name(VIDIOC_DQBUF), "VIDIOC_DQBUF");
        assert_eq!(name(0), "VIDIOC_UNKNOWN");
    }
}
