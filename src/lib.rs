//! Zero-copy video capture and memory-to-memory streaming for video4linux devices.
//!
//! A [`Device`] negotiates a pixel format with the driver, maps a pool of driver-allocated
//! buffers into the process and moves them between the driver and the consumer without
//! copying frame data:
//!
//! ```no_run
//! use std::time::Duration;
//! use webcam::{Device, FourCC, Readiness};
//!
//! let mut dev = Device::new(0)?;
//! let format = dev.set_format(FourCC::MJPG, 1280, 720)?;
//! println!("capturing {}x{}", format.width, format.height);
//!
//! dev.start_streaming()?;
//! if dev.wait_for_frame(Duration::from_secs(5))? == Readiness::Ready {
//!     let (frame, index) = dev.get_frame()?;
//!     println!("got {} bytes", frame.len());
//!     dev.release_frame(index)?;
//! }
//! dev.close()?;
//! # Ok::<(), webcam::Error>(())
//! ```
//!
//! Everything that talks to the device goes through the [`Handle`] trait, so the driver can be
//! replaced by a simulation.

pub mod v4l2;

pub mod buffer;
pub mod capability;
pub mod control;
pub mod device;
pub mod error;
pub mod format;
pub mod fraction;
pub mod framesize;
pub mod handle;
pub mod io;
pub mod memory;
pub mod negotiate;
pub mod parameters;
pub mod timestamp;
pub mod wait;

mod pselect;

pub use capability::Capabilities;
pub use device::Device;
pub use error::{Error, Result};
pub use format::{Format, FourCC};
pub use fraction::Fraction;
pub use framesize::FrameSize;
pub use handle::{FdHandle, Handle};
pub use io::stream::{State as StreamState, DEFAULT_BUFFER_COUNT};
pub use memory::{Memory, Mmap};
pub use timestamp::Timestamp;
pub use wait::Readiness;
