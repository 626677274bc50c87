//! Simulated video4linux driver
//!
//! [`FakeDriver`] answers the device control calls the crate issues by decoding the records
//! the same way the kernel would read them. Buffers are backed by heap memory handed out
//! through [`Handle::mmap`]. Every state changing call is recorded in an event log so tests
//! can check the order in which the crate talks to the driver.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use webcam::format::FourCC;
use webcam::memory::Mmap;
use webcam::v4l2::layout::PLANE_SIZE;
use webcam::v4l2::videodev::*;
use webcam::v4l2::vidioc;
use webcam::Handle;

pub const CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
pub const CAP_VIDEO_M2M_MPLANE: u32 = 0x0000_4000;
pub const CAP_VIDEO_M2M: u32 = 0x0000_8000;
pub const CAP_STREAMING: u32 = 0x0400_0000;
pub const CAP_DEVICE_CAPS: u32 = 0x8000_0000;

const BUF_FLAG_DONE: u32 = 0x0004;
const FMT_FLAG_COMPRESSED: u32 = 0x0001;
const OFFSET_SHIFT: u32 = 20;

/// Everything the simulated driver knows
pub struct DriverState {
    pub caps: v4l2_capability,
    /// Pixel formats per buffer type, in enumeration order
    pub formats: Vec<(u32, FourCC)>,
    /// Enumerating formats fails at this index with this errno
    pub enum_fmt_error: Option<(u32, i32)>,
    pub framesizes: Vec<v4l2_frmsize>,
    /// Pixel format the capture plane produces on memory-to-memory devices
    pub m2m_capture_fourcc: FourCC,
    pub max_width: u32,
    pub max_height: u32,
    pub current: HashMap<u32, v4l2_format>,

    pub max_buffers: u32,
    pub buffer_len: u32,
    pub payload_len: u32,
    /// Mapping the buffer with this index fails
    pub fail_map_at: Option<u32>,
    /// Restricts `fail_map_at` to one buffer type
    pub fail_map_type: Option<u32>,
    /// Turning this buffer type on fails
    pub fail_stream_on: Option<u32>,
    /// The next dequeue reports this index, whether it was queued or not
    pub dequeue_index: Option<u32>,
    /// Payload offset reported in multi-planar buffer descriptors
    pub data_offset: u32,
    pub allocated: HashMap<u32, u32>,
    pub queued: HashMap<u32, VecDeque<u32>>,
    pub streaming: HashSet<u32>,
    pub sequence: u32,
    mappings: HashMap<u32, (usize, usize)>,
    pub mapped: usize,
    pub unmapped: usize,

    pub controls: Vec<v4l2_queryctrl>,
    pub values: HashMap<u32, i32>,

    pub time_per_frame: bool,
    pub parm: v4l2_streamparm_data,

    /// Tick at which the device becomes readable, never if unset
    pub ready_at: Option<u64>,
    pub clock: u64,
    /// Number of waits to fail with EINTR before answering
    pub interrupts: u32,
    pub waits: u32,
    /// Timeout passed to every wait
    pub timeouts: Vec<Duration>,

    pub closed: u32,
    pub log: Vec<String>,
}

impl DriverState {
    fn capture_device() -> Self {
        DriverState {
            caps: v4l2_capability {
                driver: "fake".into(),
                card: "Fake Camera".into(),
                bus_info: "platform:fake".into(),
                version: 0x0006_0100,
                capabilities: CAP_VIDEO_CAPTURE | CAP_STREAMING | CAP_DEVICE_CAPS,
                device_caps: CAP_VIDEO_CAPTURE | CAP_STREAMING,
            },
            formats: vec![
                (V4L2_BUF_TYPE_VIDEO_CAPTURE, FourCC::YUYV),
                (V4L2_BUF_TYPE_VIDEO_CAPTURE, FourCC::MJPG),
            ],
            framesizes: vec![
                v4l2_frmsize::Discrete(v4l2_frmsize_discrete {
                    width: 640,
                    height: 480,
                }),
                v4l2_frmsize::Discrete(v4l2_frmsize_discrete {
                    width: 1280,
                    height: 720,
                }),
            ],
            enum_fmt_error: None,
            m2m_capture_fourcc: FourCC::YUYV,
            max_width: 1920,
            max_height: 1080,
            current: HashMap::new(),

            max_buffers: 4,
            buffer_len: 4096,
            payload_len: 1000,
            fail_map_at: None,
            fail_map_type: None,
            fail_stream_on: None,
            dequeue_index: None,
            data_offset: 0,
            allocated: HashMap::new(),
            queued: HashMap::new(),
            streaming: HashSet::new(),
            sequence: 0,
            mappings: HashMap::new(),
            mapped: 0,
            unmapped: 0,

            controls: Vec::new(),
            values: HashMap::new(),

            time_per_frame: true,
            parm: v4l2_streamparm_data::default(),

            ready_at: Some(0),
            clock: 0,
            interrupts: 0,
            waits: 0,
            timeouts: Vec::new(),

            closed: 0,
            log: Vec::new(),
        }
    }

    fn queued(&mut self, typ: u32) -> &mut VecDeque<u32> {
        self.queued.entry(typ).or_default()
    }

    fn offset(&self, typ: u32, index: u32) -> u32 {
        (typ << OFFSET_SHIFT) | (index * self.buffer_len)
    }

    fn snap(&self, width: u32, height: u32) -> (u32, u32) {
        (
            (width.min(self.max_width) & !0xf).max(16),
            (height.min(self.max_height) & !0xf).max(16),
        )
    }

    fn accepts(&self, typ: u32, fourcc: FourCC) -> bool {
        self.formats.iter().any(|&(t, f)| t == typ && f == fourcc)
    }
}

/// Simulated driver behind a cloneable handle
///
/// Clones share their state, so a test keeps one clone to inspect the driver while the
/// device owns the other.
#[derive(Clone)]
pub struct FakeDriver {
    state: Rc<RefCell<DriverState>>,
}

impl FakeDriver {
    /// Returns a single-planar capture device with two formats and four buffers
    pub fn capture() -> Self {
        FakeDriver {
            state: Rc::new(RefCell::new(DriverState::capture_device())),
        }
    }

    /// Returns a single-planar memory-to-memory device converting MJPG to YUYV
    pub fn m2m() -> Self {
        let driver = Self::capture();
        driver.with(|s| {
            s.caps.capabilities = CAP_VIDEO_M2M | CAP_STREAMING;
            s.formats = vec![
                (V4L2_BUF_TYPE_VIDEO_OUTPUT, FourCC::MJPG),
                (V4L2_BUF_TYPE_VIDEO_CAPTURE, FourCC::YUYV),
            ];
        });
        driver
    }

    /// Returns a multi-planar memory-to-memory device converting H264 to YUYV
    pub fn m2m_mplane() -> Self {
        let driver = Self::capture();
        driver.with(|s| {
            s.caps.capabilities = CAP_VIDEO_M2M_MPLANE | CAP_STREAMING;
            s.formats = vec![
                (V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE, FourCC::H264),
                (V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE, FourCC::YUYV),
            ];
        });
        driver
    }

    /// Runs `f` on the driver state
    pub fn with<R>(&self, f: impl FnOnce(&mut DriverState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    /// Returns the logged events starting with `prefix`
    pub fn events(&self, prefix: &str) -> Vec<String> {
        self.with(|s| {
            s.log
                .iter()
                .filter(|event| event.starts_with(prefix))
                .cloned()
                .collect()
        })
    }

    pub fn queued_count(&self, typ: u32) -> usize {
        self.with(|s| s.queued.get(&typ).map_or(0, VecDeque::len))
    }

    pub fn live_mappings(&self) -> usize {
        self.with(|s| s.mappings.len())
    }
}

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

/// Reads the first plane descriptor of a multi-planar buffer record
///
/// # Safety
///
/// `addr` must be the address of a live plane array, as set up by the caller of the control
/// call.
unsafe fn read_plane(addr: usize) -> v4l2_plane {
    v4l2_plane::decode(std::slice::from_raw_parts(addr as *const u8, PLANE_SIZE))
}

unsafe fn write_plane(addr: usize, plane: &v4l2_plane) {
    plane.encode(std::slice::from_raw_parts_mut(addr as *mut u8, PLANE_SIZE));
}

fn is_mplane(typ: u32) -> bool {
    typ == V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE || typ == V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE
}

fn is_output(typ: u32) -> bool {
    typ == V4L2_BUF_TYPE_VIDEO_OUTPUT || typ == V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE
}

fn capture_of(output: u32) -> u32 {
    if is_mplane(output) {
        V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE
    } else {
        V4L2_BUF_TYPE_VIDEO_CAPTURE
    }
}

impl FakeDriver {
    fn enum_fmt(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let mut desc = v4l2_fmtdesc::decode(raw);
        if let Some((index, code)) = s.enum_fmt_error {
            if desc.index == index {
                return Err(errno(code));
            }
        }
        let fourcc = s
            .formats
            .iter()
            .filter(|(typ, _)| *typ == desc.type_)
            .nth(desc.index as usize)
            .map(|&(_, fourcc)| fourcc)
            .ok_or_else(|| errno(libc::EINVAL))?;
        desc.pixelformat = fourcc.into();
        desc.description = fourcc.to_string();
        if fourcc == FourCC::MJPG || fourcc == FourCC::H264 {
            desc.flags = FMT_FLAG_COMPRESSED;
        }
        desc.encode(raw);
        Ok(())
    }

    fn enum_framesizes(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let mut query = v4l2_frmsizeenum::decode(raw);
        query.size = *s
            .framesizes
            .get(query.index as usize)
            .ok_or_else(|| errno(libc::EINVAL))?;
        query.encode(raw);
        Ok(())
    }

    fn g_fmt(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let typ = v4l2_format::decode(raw).type_;
        let fmt = s
            .current
            .get(&typ)
            .cloned()
            .unwrap_or_else(|| v4l2_format::empty(typ));
        fmt.encode(raw);
        Ok(())
    }

    fn configure(s: &DriverState, typ: u32, fourcc: FourCC, width: u32, height: u32) -> v4l2_format {
        let (width, height) = s.snap(width, height);
        let mut fmt = v4l2_format::empty(typ);
        match &mut fmt.fmt {
            v4l2_format_union::Pix(pix) => {
                pix.width = width;
                pix.height = height;
                pix.pixelformat = fourcc.into();
                pix.field = 1;
                pix.bytesperline = width * 2;
                pix.sizeimage = width * height * 2;
            }
            v4l2_format_union::PixMp(pix_mp) => {
                pix_mp.width = width;
                pix_mp.height = height;
                pix_mp.pixelformat = fourcc.into();
                pix_mp.field = 1;
                pix_mp.num_planes = 1;
                pix_mp.plane_fmt[0].bytesperline = width * 2;
                pix_mp.plane_fmt[0].sizeimage = width * height * 2;
            }
            v4l2_format_union::Raw(_) => {}
        }
        fmt
    }

    fn s_fmt(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let fmt = v4l2_format::decode(raw);
        let (fourcc, width, height) = match &fmt.fmt {
            v4l2_format_union::Pix(pix) => (pix.pixelformat, pix.width, pix.height),
            v4l2_format_union::PixMp(pix_mp) => (pix_mp.pixelformat, pix_mp.width, pix_mp.height),
            v4l2_format_union::Raw(_) => return Err(errno(libc::EINVAL)),
        };
        let fourcc = FourCC::from(fourcc);
        if !s.accepts(fmt.type_, fourcc) {
            return Err(errno(libc::EINVAL));
        }
        if s.allocated.get(&fmt.type_).copied().unwrap_or(0) > 0 {
            return Err(errno(libc::EBUSY));
        }

        let confirmed = Self::configure(s, fmt.type_, fourcc, width, height);
        confirmed.encode(raw);
        s.current.insert(fmt.type_, confirmed);
        s.log.push(format!("S_FMT {} {}", fmt.type_, fourcc));

        if is_output(fmt.type_) {
            let capture = capture_of(fmt.type_);
            let derived = Self::configure(s, capture, s.m2m_capture_fourcc, width, height);
            s.current.insert(capture, derived);
        }
        Ok(())
    }

    fn reqbufs(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let mut req = v4l2_requestbuffers::decode(raw);
        if req.memory != V4L2_MEMORY_MMAP {
            return Err(errno(libc::EINVAL));
        }
        if s.streaming.contains(&req.type_) {
            return Err(errno(libc::EBUSY));
        }

        req.count = req.count.min(s.max_buffers);
        s.allocated.insert(req.type_, req.count);
        s.queued(req.type_).clear();
        s.log.push(format!("REQBUFS {} {}", req.type_, req.count));
        req.encode(raw);
        Ok(())
    }

    fn querybuf(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let mut desc = v4l2_buffer::decode(raw);
        if desc.index >= s.allocated.get(&desc.type_).copied().unwrap_or(0) {
            return Err(errno(libc::EINVAL));
        }

        let offset = s.offset(desc.type_, desc.index);
        match desc.m {
            v4l2_buffer_m::Planes(addr) => unsafe {
                let mut plane = read_plane(addr);
                plane.length = s.buffer_len;
                plane.mem_offset = offset;
                write_plane(addr, &plane);
            },
            _ => {
                desc.m = v4l2_buffer_m::Offset(offset);
                desc.length = s.buffer_len;
            }
        }
        desc.encode(raw);
        Ok(())
    }

    fn qbuf(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let desc = v4l2_buffer::decode(raw);
        if desc.index >= s.allocated.get(&desc.type_).copied().unwrap_or(0) {
            return Err(errno(libc::EINVAL));
        }
        if s.queued(desc.type_).contains(&desc.index) {
            return Err(errno(libc::EINVAL));
        }

        s.queued(desc.type_).push_back(desc.index);
        s.log.push(format!("QBUF {} {}", desc.type_, desc.index));
        Ok(())
    }

    fn dqbuf(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let mut desc = v4l2_buffer::decode(raw);
        let typ = desc.type_;
        if !s.streaming.contains(&typ) {
            return Err(errno(libc::EINVAL));
        }
        let index = match s.dequeue_index.take() {
            Some(index) => {
                s.queued(typ).retain(|&queued| queued != index);
                index
            }
            None => s.queued(typ).pop_front().ok_or_else(|| errno(libc::EAGAIN))?,
        };

        let sequence = s.sequence;
        s.sequence += 1;
        let bytesused = if is_output(typ) {
            0
        } else {
            s.payload_len.min(s.buffer_len)
        };

        if !is_output(typ) {
            let offset = s.offset(typ, index);
            if let Some(&(ptr, len)) = s.mappings.get(&offset) {
                let fill = (bytesused as usize).min(len);
                unsafe { std::ptr::write_bytes(ptr as *mut u8, sequence as u8, fill) };
            }
        }

        desc.index = index;
        desc.flags = BUF_FLAG_DONE;
        desc.sequence = sequence;
        desc.timestamp = v4l2_timeval {
            tv_sec: sequence as i64,
            tv_usec: 500,
        };
        match desc.m {
            v4l2_buffer_m::Planes(addr) => unsafe {
                let mut plane = read_plane(addr);
                plane.bytesused = bytesused;
                plane.length = s.buffer_len;
                plane.data_offset = s.data_offset;
                write_plane(addr, &plane);
            },
            _ => {
                desc.bytesused = bytesused;
                desc.length = s.buffer_len;
            }
        }
        desc.encode(raw);
        s.log.push(format!("DQBUF {} {}", typ, index));
        Ok(())
    }

    fn streamon(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let typ = u32::decode(raw);
        if s.allocated.get(&typ).copied().unwrap_or(0) == 0 {
            return Err(errno(libc::EINVAL));
        }
        if s.fail_stream_on == Some(typ) {
            return Err(errno(libc::EIO));
        }

        s.streaming.insert(typ);
        s.log.push(format!("STREAMON {}", typ));
        Ok(())
    }

    fn streamoff(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let typ = u32::decode(raw);
        s.streaming.remove(&typ);
        s.queued(typ).clear();
        s.log.push(format!("STREAMOFF {}", typ));
        Ok(())
    }

    fn parm(s: &mut DriverState, raw: &mut [u8], set: bool) -> io::Result<()> {
        let mut parm = v4l2_streamparm::decode(raw);
        let data = match &mut parm.parm {
            v4l2_streamparm_union::Capture(data) | v4l2_streamparm_union::Output(data) => data,
            v4l2_streamparm_union::Raw(_) => return Err(errno(libc::EINVAL)),
        };

        if set && s.time_per_frame {
            s.parm.timeperframe = data.timeperframe;
            s.log.push(format!(
                "S_PARM {}/{}",
                data.timeperframe.numerator, data.timeperframe.denominator
            ));
        }
        *data = s.parm;
        if s.time_per_frame {
            data.capability |= V4L2_CAP_TIMEPERFRAME;
        }
        parm.encode(raw);
        Ok(())
    }

    fn queryctrl(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let query = v4l2_queryctrl::decode(raw);
        let ctrl = if query.id & V4L2_CTRL_FLAG_NEXT_CTRL != 0 {
            let after = query.id & !(V4L2_CTRL_FLAG_NEXT_CTRL | V4L2_CTRL_FLAG_NEXT_COMPOUND);
            s.controls.iter().find(|ctrl| ctrl.id > after)
        } else {
            s.controls.iter().find(|ctrl| ctrl.id == query.id)
        };
        ctrl.ok_or_else(|| errno(libc::EINVAL))?.encode(raw);
        Ok(())
    }

    fn g_ctrl(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let mut ctrl = v4l2_control::decode(raw);
        ctrl.value = *s.values.get(&ctrl.id).ok_or_else(|| errno(libc::EINVAL))?;
        ctrl.encode(raw);
        Ok(())
    }

    fn s_ctrl(s: &mut DriverState, raw: &mut [u8]) -> io::Result<()> {
        let ctrl = v4l2_control::decode(raw);
        let value = s.values.get_mut(&ctrl.id).ok_or_else(|| errno(libc::EINVAL))?;
        *value = ctrl.value;
        s.log.push(format!("S_CTRL {:#x} {}", ctrl.id, ctrl.value));
        Ok(())
    }
}

impl Handle for FakeDriver {
    fn ioctl(&self, request: vidioc::_IOC_TYPE, record: &mut [u8]) -> io::Result<()> {
        let mut s = self.state.borrow_mut();
        let s = &mut *s;
        match request {
            vidioc::VIDIOC_QUERYCAP => {
                s.caps.encode(record);
                Ok(())
            }
            vidioc::VIDIOC_ENUM_FMT => Self::enum_fmt(s, record),
            vidioc::VIDIOC_ENUM_FRAMESIZES => Self::enum_framesizes(s, record),
            vidioc::VIDIOC_G_FMT => Self::g_fmt(s, record),
            vidioc::VIDIOC_S_FMT => Self::s_fmt(s, record),
            vidioc::VIDIOC_REQBUFS => Self::reqbufs(s, record),
            vidioc::VIDIOC_QUERYBUF => Self::querybuf(s, record),
            vidioc::VIDIOC_QBUF => Self::qbuf(s, record),
            vidioc::VIDIOC_DQBUF => Self::dqbuf(s, record),
            vidioc::VIDIOC_STREAMON => Self::streamon(s, record),
            vidioc::VIDIOC_STREAMOFF => Self::streamoff(s, record),
            vidioc::VIDIOC_G_PARM => Self::parm(s, record, false),
            vidioc::VIDIOC_S_PARM => Self::parm(s, record, true),
            vidioc::VIDIOC_QUERYCTRL => Self::queryctrl(s, record),
            vidioc::VIDIOC_G_CTRL => Self::g_ctrl(s, record),
            vidioc::VIDIOC_S_CTRL => Self::s_ctrl(s, record),
            _ => Err(errno(libc::ENOTTY)),
        }
    }

    fn mmap(&self, offset: u32, length: usize) -> io::Result<Mmap> {
        let mut s = self.state.borrow_mut();
        let typ = offset >> OFFSET_SHIFT;
        let index = (offset & ((1 << OFFSET_SHIFT) - 1)) / s.buffer_len;
        if s.fail_map_at == Some(index) && s.fail_map_type.map_or(true, |t| t == typ) {
            return Err(errno(libc::ENOMEM));
        }

        let ptr = Box::into_raw(vec![0u8; length].into_boxed_slice()) as *mut u8;
        s.mappings.insert(offset, (ptr as usize, length));
        s.mapped += 1;
        // the region is freed again in munmap
        unsafe { Mmap::from_raw_parts(ptr, length) }.ok_or_else(|| errno(libc::ENOMEM))
    }

    fn munmap(&self, region: Mmap) -> io::Result<()> {
        let mut s = self.state.borrow_mut();
        let (ptr, len) = region.into_raw_parts();
        let offset = s
            .mappings
            .iter()
            .find(|(_, &(p, _))| p == ptr as usize)
            .map(|(&offset, _)| offset)
            .ok_or_else(|| errno(libc::EINVAL))?;
        s.mappings.remove(&offset);
        s.unmapped += 1;

        drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)) });
        Ok(())
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<usize> {
        let mut s = self.state.borrow_mut();
        s.waits += 1;
        s.timeouts.push(timeout);
        if s.interrupts > 0 {
            s.interrupts -= 1;
            return Err(errno(libc::EINTR));
        }

        let deadline = s.clock + timeout.as_secs();
        match s.ready_at {
            Some(tick) if tick <= deadline => {
                s.clock = s.clock.max(tick);
                Ok(1)
            }
            _ => {
                s.clock = deadline;
                Ok(0)
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let mut s = self.state.borrow_mut();
        s.closed += 1;
        s.log.push("CLOSE".to_string());
        Ok(())
    }
}

/// Routes the crate's log output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
