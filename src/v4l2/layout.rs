//! Platform dependent record geometry
//!
//! The video4linux records embed `struct timeval`, pointers and unions containing pointers.
//! Their size and the offsets of every field following such a member therefore depend on the
//! pointer width of the target. All values here are compile time constants.

#[cfg(target_pointer_width = "64")]
mod detail {
    pub const PTR_SIZE: usize = 8;

    /// `struct v4l2_format`: the `fmt` union is 8-byte aligned (it contains `v4l2_window`)
    pub const FORMAT_UNION: usize = 8;
    pub const FORMAT_SIZE: usize = 208;

    pub const BUFFER_TIMESTAMP: usize = 24;
    pub const BUFFER_SEQUENCE: usize = 56;
    pub const BUFFER_MEMORY: usize = 60;
    pub const BUFFER_M: usize = 64;
    pub const BUFFER_LENGTH: usize = 72;
    pub const BUFFER_REQUEST_FD: usize = 80;
    pub const BUFFER_SIZE: usize = 88;

    pub const PLANE_M: usize = 8;
    pub const PLANE_DATA_OFFSET: usize = 16;
    pub const PLANE_SIZE: usize = 64;
}

#[cfg(target_pointer_width = "32")]
mod detail {
    pub const PTR_SIZE: usize = 4;

    pub const FORMAT_UNION: usize = 4;
    pub const FORMAT_SIZE: usize = 204;

    pub const BUFFER_TIMESTAMP: usize = 20;
    pub const BUFFER_SEQUENCE: usize = 44;
    pub const BUFFER_MEMORY: usize = 48;
    pub const BUFFER_M: usize = 52;
    pub const BUFFER_LENGTH: usize = 56;
    pub const BUFFER_REQUEST_FD: usize = 64;
    pub const BUFFER_SIZE: usize = 68;

    pub const PLANE_M: usize = 8;
    pub const PLANE_DATA_OFFSET: usize = 12;
    pub const PLANE_SIZE: usize = 60;
}

pub use detail::*;

/// Size of the raw `fmt` union inside `struct v4l2_format`
pub const FORMAT_UNION_SIZE: usize = 200;
/// Size of the raw `parm` union inside `struct v4l2_streamparm`
pub const STREAMPARM_UNION_SIZE: usize = 200;

/// Maximum number of planes a multi-planar format can describe
pub const VIDEO_MAX_PLANES: usize = 8;

pub(crate) fn get_u8(buf: &[u8], off: usize) -> u8 {
    buf[off]
}

pub(crate) fn put_u8(buf: &mut [u8], off: usize, val: u8) {
    buf[off] = val;
}

pub(crate) fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[off..off + 4]);
    u32::from_ne_bytes(raw)
}

pub(crate) fn put_u32(buf: &mut [u8], off: usize, val: u32) {
    buf[off..off + 4].copy_from_slice(&val.to_ne_bytes());
}

pub(crate) fn get_i32(buf: &[u8], off: usize) -> i32 {
    get_u32(buf, off) as i32
}

pub(crate) fn put_i32(buf: &mut [u8], off: usize, val: i32) {
    put_u32(buf, off, val as u32);
}

/// Reads a native `long`/pointer sized word
pub(crate) fn get_word(buf: &[u8], off: usize) -> usize {
    let mut raw = [0u8; PTR_SIZE];
    raw.copy_from_slice(&buf[off..off + PTR_SIZE]);
    usize::from_ne_bytes(raw)
}

pub(crate) fn put_word(buf: &mut [u8], off: usize, val: usize) {
    buf[off..off + PTR_SIZE].copy_from_slice(&val.to_ne_bytes());
}

/// Reads a NUL terminated (or NUL padded) string field of `len` bytes
pub(crate) fn get_cstr(buf: &[u8], off: usize, len: usize) -> String {
    let field = &buf[off..off + len];
    let end = field.iter().position(|&b| b == 0).unwrap_or(len);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Writes a string field, truncating so that at least one NUL byte remains
pub(crate) fn put_cstr(buf: &mut [u8], off: usize, len: usize, val: &str) {
    let field = &mut buf[off..off + len];
    field.fill(0);
    let n = val.len().min(len.saturating_sub(1));
    field[..n].copy_from_slice(&val.as_bytes()[..n]);
}
