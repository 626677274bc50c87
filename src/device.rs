use std::path::Path;
use std::time::Duration;

use log::{debug, warn};

use crate::buffer::{Metadata, Type};
use crate::capability::{Capabilities, Flags};
use crate::control::{self, Controls};
use crate::error::{Error, Result};
use crate::format::{Format, FourCC};
use crate::fraction::Fraction;
use crate::handle::{self, FdHandle, Handle};
use crate::io::stream::{State, Stream};
use crate::negotiate::{self, FrameSizes, Formats};
use crate::parameters::{self, Parameters};
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;
use crate::wait::{self, Readiness};

/// Video device in capture or memory-to-memory mode
///
/// A capture device streams frames the driver fills into a single buffer pool. A
/// memory-to-memory device additionally owns an output pool: the application writes input
/// data into output buffers and reads the driver's results from capture buffers.
///
/// All calls are blocking and the type provides no internal locking. Closing (or dropping) a
/// streaming device stops the stream first.
pub struct Device<H: Handle = FdHandle> {
    handle: H,
    caps: Capabilities,
    stream: Stream,
    m2m: bool,
    closed: bool,
}

impl Device<FdHandle> {
    /// Returns a capture device by index
    ///
    /// Devices are usually enumerated by the system. An index of zero thus represents the
    /// first device the system got to know about.
    ///
    /// # Arguments
    ///
    /// * `index` - Index (0: first, 1: second, ..)
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::Device;
    /// let dev = Device::new(0);
    /// ```
    pub fn new(index: usize) -> Result<Self> {
        Self::with_path(format!("/dev/video{}", index))
    }

    /// Returns a capture device by path
    ///
    /// Linux device nodes are usually found in /dev/videoX or /sys/class/video4linux/videoX.
    ///
    /// # Arguments
    ///
    /// * `path` - Path (e.g. "/dev/video0")
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::Device;
    /// let dev = Device::with_path("/dev/video0");
    /// ```
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_handle(open(path.as_ref())?)
    }

    /// Returns a memory-to-memory device by path
    ///
    /// # Arguments
    ///
    /// * `path` - Path (e.g. "/dev/video11")
    pub fn m2m_with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::m2m_from_handle(open(path.as_ref())?)
    }
}

fn open(path: &Path) -> Result<FdHandle> {
    FdHandle::open(path).map_err(|source| Error::OpenFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn query_caps<H: Handle + ?Sized>(handle: &H) -> Result<Capabilities> {
    handle::xfer(handle, vidioc::VIDIOC_QUERYCAP, &v4l2_capability::default())
        .map(Capabilities::from)
        .map_err(|source| Error::DeviceControl {
            op: "VIDIOC_QUERYCAP",
            source,
        })
}

impl<H: Handle> Device<H> {
    /// Wraps an open handle as capture device
    ///
    /// Fails if the device cannot capture video or does not support streaming I/O.
    pub fn from_handle(handle: H) -> Result<Self> {
        let caps = query_caps(&handle)?;
        let flags = caps.effective();
        if !flags.contains(Flags::VIDEO_CAPTURE) {
            return Err(Error::NotCaptureDevice);
        }
        if !flags.contains(Flags::STREAMING) {
            return Err(Error::StreamingUnsupported);
        }

        debug!("opened capture device {} ({})", caps.card, caps.driver);
        Ok(Device {
            handle,
            caps,
            stream: Stream::new(Type::VideoCapture, None),
            m2m: false,
            closed: false,
        })
    }

    /// Wraps an open handle as memory-to-memory device
    ///
    /// Devices advertising multi-planar memory-to-memory support use multi-planar buffers,
    /// others use single-planar ones.
    pub fn m2m_from_handle(handle: H) -> Result<Self> {
        let caps = query_caps(&handle)?;
        let flags = caps.effective();
        let (output, capture) = if flags.contains(Flags::VIDEO_M2M_MPLANE) {
            (Type::VideoOutputMplane, Type::VideoCaptureMplane)
        } else if flags.contains(Flags::VIDEO_M2M) {
            (Type::VideoOutput, Type::VideoCapture)
        } else {
            return Err(Error::NotM2MDevice);
        };

        debug!(
            "opened memory-to-memory device {} ({}), {} -> {}",
            caps.card, caps.driver, output, capture
        );
        Ok(Device {
            handle,
            caps,
            stream: Stream::new(capture, Some(output)),
            m2m: true,
            closed: false,
        })
    }

    /// Returns the underlying handle
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Returns the capabilities reported when the device was opened
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Whether the device was opened in memory-to-memory mode
    pub fn is_m2m(&self) -> bool {
        self.m2m
    }

    fn capture_type(&self) -> Type {
        self.stream.capture().buf_type()
    }

    fn output_type(&self) -> Result<Type> {
        self.stream.output().map(|arena| arena.buf_type())
    }

    /// Enumerates the pixel formats of the capture plane
    ///
    /// The sequence ends where the driver reports no further entries. Formats may repeat
    /// and come in whatever order the driver chooses.
    pub fn formats(&self) -> Formats<'_, H> {
        Formats::new(&self.handle, self.capture_type())
    }

    /// Enumerates the pixel formats accepted on the output plane of a memory-to-memory device
    pub fn output_formats(&self) -> Result<Formats<'_, H>> {
        Ok(Formats::new(&self.handle, self.output_type()?))
    }

    /// Enumerates the frame sizes supported for a pixel format
    pub fn framesizes(&self, fourcc: FourCC) -> FrameSizes<'_, H> {
        FrameSizes::new(&self.handle, fourcc)
    }

    /// Returns the current capture format
    pub fn format(&self) -> Result<Format> {
        negotiate::get(&self.handle, self.capture_type())
    }

    /// Requests a capture format
    ///
    /// The driver may substitute any of the values; the returned format is what it actually
    /// configured.
    ///
    /// # Arguments
    ///
    /// * `fourcc` - Pixel format
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    pub fn set_format(&self, fourcc: FourCC, width: u32, height: u32) -> Result<Format> {
        if self.m2m {
            return Err(Error::WrongMode);
        }
        negotiate::set(
            &self.handle,
            self.capture_type(),
            &Format::new(width, height, fourcc),
        )
    }

    /// Requests the output format of a memory-to-memory device
    ///
    /// Returns the capture format the driver derived from it.
    pub fn set_m2m_format(&self, fourcc: FourCC, width: u32, height: u32) -> Result<Format> {
        negotiate::set_m2m(
            &self.handle,
            self.output_type()?,
            self.capture_type(),
            &Format::new(width, height, fourcc),
        )
    }

    /// Sets the number of buffers requested per pool when streaming starts
    ///
    /// The driver may grant fewer. Not allowed while streaming. Buffers prepared with another
    /// count are released again.
    pub fn set_buffer_count(&mut self, count: u32) -> Result<()> {
        self.stream.set_buffer_count(&self.handle, count)
    }

    pub fn buffer_count(&self) -> u32 {
        self.stream.buffer_count()
    }

    /// Number of capture buffers granted by the driver, zero while idle
    pub fn buffers(&self) -> usize {
        self.stream.capture().len()
    }

    pub fn state(&self) -> State {
        self.stream.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.state() == State::Streaming
    }

    /// Allocates and maps the buffer pools without starting the stream
    pub fn prepare_buffers(&mut self) -> Result<()> {
        self.stream.prepare(&self.handle)
    }

    /// Allocates buffers if necessary, queues them all and turns the stream on
    pub fn start_streaming(&mut self) -> Result<()> {
        self.stream.start(&self.handle)
    }

    /// Turns the stream off and releases all buffers
    ///
    /// Buffers must be requested anew by starting the stream again.
    pub fn stop_streaming(&mut self) -> Result<()> {
        self.stream.stop(&self.handle)
    }

    /// Takes the next frame from the driver
    ///
    /// Returns the frame's bytes and the index of its buffer. The buffer belongs to the caller
    /// until it is returned with [`Device::release_frame`]. Since the device is non-blocking,
    /// calling this before [`Device::wait_for_frame`] reported readiness fails with `EAGAIN`.
    pub fn get_frame(&mut self) -> Result<(&[u8], u32)> {
        let index = self.stream.dequeue(&self.handle)?;
        Ok((self.stream.capture().data(index)?, index))
    }

    /// Returns the bytes of a frame the caller holds
    pub fn frame(&self, index: u32) -> Result<&[u8]> {
        self.stream.capture().data(index)
    }

    /// Returns a frame buffer to the driver
    pub fn release_frame(&mut self, index: u32) -> Result<()> {
        self.stream.queue(&self.handle, index)
    }

    /// Copies the next frame and returns its buffer to the driver right away
    pub fn read_frame(&mut self) -> Result<Vec<u8>> {
        let (data, index) = self.get_frame()?;
        let frame = data.to_vec();
        self.release_frame(index)?;
        Ok(frame)
    }

    /// Returns the metadata recorded when the capture buffer was last dequeued
    pub fn frame_metadata(&self, index: u32) -> Result<Metadata> {
        self.stream.capture().get(index).map(|buf| *buf.meta())
    }

    /// Takes an output buffer the driver has consumed
    ///
    /// Returns the writable buffer and its index. Fill it and hand it back with
    /// [`Device::queue_output_buffer`].
    pub fn get_output_buffer(&mut self) -> Result<(&mut [u8], u32)> {
        let index = self.stream.dequeue_output(&self.handle)?;
        Ok((self.stream.output_data_mut(index)?, index))
    }

    /// Hands a filled output buffer to the driver
    ///
    /// # Arguments
    ///
    /// * `index` - Buffer index as returned by [`Device::get_output_buffer`]
    /// * `bytesused` - Number of bytes written, zero meaning the whole buffer
    pub fn queue_output_buffer(&mut self, index: u32, bytesused: u32) -> Result<()> {
        self.stream.queue_output(&self.handle, index, bytesused)
    }

    /// Blocks until a frame is ready or `timeout` elapses
    ///
    /// A timeout is reported as [`Readiness::TimedOut`], not as error.
    pub fn wait_for_frame(&self, timeout: Duration) -> Result<Readiness> {
        wait::wait_readable(&self.handle, timeout)
    }

    /// Enumerates the device controls
    pub fn controls(&self) -> Controls<'_, H> {
        Controls::new(&self.handle)
    }

    /// Reads the current value of a control
    pub fn control(&self, id: u32) -> Result<i32> {
        control::get(&self.handle, id)
    }

    /// Writes a control value
    ///
    /// The value is passed through unchecked.
    pub fn set_control(&self, id: u32, value: i32) -> Result<()> {
        control::set(&self.handle, id, value)
    }

    pub fn set_auto_white_balance(&self, enabled: bool) -> Result<()> {
        self.set_control(control::V4L2_CID_AUTO_WHITE_BALANCE, enabled as i32)
    }

    /// Stream parameters apply to the plane the frame rate is defined on
    fn parm_type(&self) -> Type {
        self.output_type().unwrap_or_else(|_| self.capture_type())
    }

    /// Returns the current stream parameters
    pub fn params(&self) -> Result<Parameters> {
        let parm = handle::xfer(
            &self.handle,
            vidioc::VIDIOC_G_PARM,
            &v4l2_streamparm::empty(self.parm_type() as u32),
        )
        .map_err(|source| Error::DeviceControl {
            op: "VIDIOC_G_PARM",
            source,
        })?;
        Ok(parm
            .data()
            .map(|data| Parameters::from(*data))
            .unwrap_or_default())
    }

    /// Returns the frame rate in frames per second
    pub fn framerate(&self) -> Result<f32> {
        let interval = self.params()?.interval;
        interval.fps().ok_or(Error::InvalidFramerate {
            numerator: interval.numerator,
            denominator: interval.denominator,
        })
    }

    /// Requests a frame rate
    ///
    /// The driver may pick a different rate; read it back with [`Device::framerate`].
    pub fn set_framerate(&self, fps: f32) -> Result<()> {
        let interval = Fraction::from_fps(fps);
        if !fps.is_finite() || interval.fps().is_none() {
            return Err(Error::InvalidFramerate {
                numerator: interval.numerator,
                denominator: interval.denominator,
            });
        }

        let mut parm = v4l2_streamparm::empty(self.parm_type() as u32);
        match &mut parm.parm {
            v4l2_streamparm_union::Capture(data) | v4l2_streamparm_union::Output(data) => {
                data.timeperframe = interval.into();
            }
            v4l2_streamparm_union::Raw(_) => return Err(Error::WrongMode),
        }

        let parm = handle::xfer(&self.handle, vidioc::VIDIOC_S_PARM, &parm).map_err(|source| {
            Error::DeviceControl {
                op: "VIDIOC_S_PARM",
                source,
            }
        })?;

        let params = parm.data().map(|data| Parameters::from(*data));
        match params {
            Some(params)
                if params
                    .capabilities
                    .contains(parameters::Capabilities::TIME_PER_FRAME) =>
            {
                debug!("frame interval set to {}", params.interval);
            }
            _ => warn!("driver does not support setting the frame interval"),
        }
        Ok(())
    }

    /// Stops the stream and releases buffers, logging failures instead of reporting them
    fn shutdown(&mut self) {
        if self.stream.state() == State::Streaming {
            if let Err(e) = self.stream.stop(&self.handle) {
                warn!("failed to stop streaming: {}", e);
            }
        } else {
            self.stream.teardown(&self.handle);
        }
    }

    /// Closes the device
    ///
    /// A running stream is stopped first. Failing to stop does not prevent closing; the
    /// reported error is the one of closing the handle.
    pub fn close(mut self) -> Result<()> {
        self.shutdown();
        self.closed = true;
        let result = self.handle.close().map_err(Error::Io);
        debug!("closed device {}", self.caps.card);
        result
    }
}

impl<H: Handle> Drop for Device<H> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        self.shutdown();
        if let Err(e) = self.handle.close() {
            warn!("failed to close device: {}", e);
        }
    }
}
