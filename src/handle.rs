use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::{io, mem, ptr, time::Duration};

use log::{trace, warn};

use crate::memory::Mmap;
use crate::pselect::{self, FdSet};
use crate::v4l2;
use crate::v4l2::videodev::Record;
use crate::v4l2::vidioc;

/// Connection to a video device
///
/// This bundles the primitives the rest of the crate consumes: the synchronous device control
/// channel, the memory mapping primitive and the readiness notification. [`FdHandle`] talks to
/// a real device node; any other implementation (e.g. a simulated driver) can be plugged into
/// [`Device`](crate::Device) instead.
pub trait Handle {
    /// Performs a device control call
    ///
    /// `record` holds the encoded argument and receives the driver's answer in place. Its
    /// length equals the record size encoded in `request`.
    fn ioctl(&self, request: vidioc::_IOC_TYPE, record: &mut [u8]) -> io::Result<()>;

    /// Maps `length` bytes of device memory starting at `offset` into the process
    fn mmap(&self, offset: u32, length: usize) -> io::Result<Mmap>;

    /// Unmaps a region previously returned by [`Handle::mmap`]
    fn munmap(&self, region: Mmap) -> io::Result<()>;

    /// Blocks until the device is readable or `timeout` elapses
    ///
    /// Returns the number of ready descriptors, zero meaning the timeout elapsed. An error of
    /// kind [`io::ErrorKind::Interrupted`] is a legal outcome and must not be treated as fatal.
    fn wait_readable(&self, timeout: Duration) -> io::Result<usize>;

    /// Closes the connection
    fn close(&mut self) -> io::Result<()>;
}

/// Encodes `record`, passes it through the control channel and decodes the driver's answer
pub(crate) fn xfer<H: Handle + ?Sized, R: Record>(
    handle: &H,
    request: vidioc::_IOC_TYPE,
    record: &R,
) -> io::Result<R> {
    let mut raw = record.to_bytes();
    handle.ioctl(request, &mut raw)?;
    Ok(R::decode(&raw))
}

/// Device node opened through the file system
#[derive(Debug)]
pub struct FdHandle {
    fd: RawFd,
}

impl FdHandle {
    /// Opens a device node in non-blocking read/write mode
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the device node, e.g. `/dev/video0`
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::FdHandle;
    /// let handle = FdHandle::open("/dev/video0");
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let fd = v4l2::open(&path, libc::O_RDWR | libc::O_NONBLOCK)?;
        trace!("opened {} as fd {}", path.as_ref().display(), fd);
        Ok(FdHandle { fd })
    }

    /// Wraps a descriptor the caller already owns
    ///
    /// # Safety
    ///
    /// `fd` must be an open descriptor that nothing else closes.
    pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
        FdHandle { fd }
    }

    /// Returns the raw file descriptor
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl AsRawFd for FdHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Handle for FdHandle {
    fn ioctl(&self, request: vidioc::_IOC_TYPE, record: &mut [u8]) -> io::Result<()> {
        if record.len() < vidioc::size(request) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: record is too small", vidioc::name(request)),
            ));
        }

        unsafe { v4l2::ioctl(self.fd, request, record.as_mut_ptr() as *mut std::os::raw::c_void) }
    }

    fn mmap(&self, offset: u32, length: usize) -> io::Result<Mmap> {
        let ptr = unsafe {
            v4l2::mmap(
                ptr::null_mut(),
                length,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.fd,
                offset as libc::off_t,
            )?
        };

        unsafe { Mmap::from_raw_parts(ptr as *mut u8, length) }
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned a null region"))
    }

    fn munmap(&self, region: Mmap) -> io::Result<()> {
        let (ptr, len) = region.into_raw_parts();
        unsafe { v4l2::munmap(ptr as *mut std::os::raw::c_void, len) }
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<usize> {
        let mut fds = FdSet::new();
        fds.set(self.fd);
        pselect::pselect(
            self.fd + 1,
            Some(&mut fds),
            None,
            None,
            Some(&pselect::make_timespec(timeout)),
            None,
        )
    }

    fn close(&mut self) -> io::Result<()> {
        if self.fd == -1 {
            return Ok(());
        }

        let fd = mem::replace(&mut self.fd, -1);
        v4l2::close(fd)
    }
}

impl Drop for FdHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close device: {}", e);
        }
    }
}
