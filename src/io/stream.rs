use std::fmt;

use log::{debug, warn};

use crate::buffer::Type;
use crate::error::{Error, Result};
use crate::handle::{self, Handle};
use crate::io::arena::Arena;
use crate::v4l2::vidioc;

/// Number of buffers requested from the driver unless configured otherwise
///
/// Drivers clamp the request to what they can actually provide.
pub const DEFAULT_BUFFER_COUNT: u32 = 256;

/// Streaming state of a device
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// No buffers are allocated
    Idle,
    /// Buffers are allocated and mapped but not handed to the driver
    Configured,
    /// Buffers circulate between driver and consumer
    Streaming,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "idle"),
            State::Configured => write!(f, "configured"),
            State::Streaming => write!(f, "streaming"),
        }
    }
}

/// Stream of buffers
///
/// Drives one buffer pool for capture devices, or an output and a capture pool for
/// memory-to-memory devices. The output pool always goes first: it is queued and turned on
/// before the capture pool, because the driver produces capture data from output data.
#[derive(Debug)]
pub(crate) struct Stream {
    capture: Arena,
    output: Option<Arena>,
    buf_count: u32,
    state: State,
}

impl Stream {
    /// Returns an idle stream
    ///
    /// # Arguments
    ///
    /// * `capture` - Type of the buffers the consumer reads from
    /// * `output` - Type of the buffers the consumer writes into, for memory-to-memory devices
    pub fn new(capture: Type, output: Option<Type>) -> Self {
        Stream {
            capture: Arena::new(capture),
            output: output.map(Arena::new),
            buf_count: DEFAULT_BUFFER_COUNT,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn buffer_count(&self) -> u32 {
        self.buf_count
    }

    /// Sets the number of buffers requested on the next allocation
    ///
    /// Pools prepared with a different count are released, so the next start requests buffers
    /// anew.
    pub fn set_buffer_count<H: Handle + ?Sized>(&mut self, handle: &H, count: u32) -> Result<()> {
        match self.state {
            State::Streaming => return Err(Error::AlreadyStreaming),
            State::Configured if count != self.buf_count => {
                debug!("buffer count changed to {}, releasing prepared buffers", count);
                self.release_all(handle);
            }
            _ => {}
        }

        self.buf_count = count;
        Ok(())
    }

    pub fn capture(&self) -> &Arena {
        &self.capture
    }

    pub fn output(&self) -> Result<&Arena> {
        self.output.as_ref().ok_or(Error::WrongMode)
    }

    /// Pools in the order they have to be queued and turned on
    fn arenas_mut(&mut self) -> impl Iterator<Item = &mut Arena> {
        self.output.iter_mut().chain(std::iter::once(&mut self.capture))
    }

    fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.output
            .iter()
            .chain(std::iter::once(&self.capture))
            .map(Arena::buf_type)
    }

    /// Allocates and maps all buffer pools
    ///
    /// Already prepared streams are left as they are. If any pool fails, pools allocated
    /// before it are released again.
    pub fn prepare<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<()> {
        match self.state {
            State::Streaming => return Err(Error::AlreadyStreaming),
            State::Configured => return Ok(()),
            State::Idle => {}
        }

        let count = self.buf_count;
        let mut result = Ok(());
        for arena in self.arenas_mut() {
            if let Err(e) = arena.allocate(handle, count) {
                result = Err(e);
                break;
            }
        }

        if let Err(e) = result {
            self.release_all(handle);
            return Err(e);
        }

        self.state = State::Configured;
        debug!("stream configured");
        Ok(())
    }

    /// Queues every buffer and turns the stream on
    ///
    /// On failure the stream returns to the state it started from.
    pub fn start<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<()> {
        let from = self.state;
        if from == State::Streaming {
            return Err(Error::AlreadyStreaming);
        }

        self.prepare(handle)?;
        if let Err(e) = self.queue_and_stream_on(handle) {
            self.abort(handle, from);
            return Err(e);
        }

        self.state = State::Streaming;
        debug!("stream on, {} capture buffers queued", self.capture.queued());
        Ok(())
    }

    fn queue_and_stream_on<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<()> {
        for arena in self.arenas_mut() {
            arena.queue_all(handle)?;
        }

        let types: Vec<Type> = self.types().collect();
        for typ in types {
            stream_on(handle, typ)?;
        }
        Ok(())
    }

    fn abort<H: Handle + ?Sized>(&mut self, handle: &H, from: State) {
        let types: Vec<Type> = self.types().collect();
        for typ in types {
            if let Err(e) = stream_off(handle, typ) {
                warn!("{}: failed to turn stream off: {}", typ, e);
            }
        }

        if from == State::Idle {
            self.release_all(handle);
        } else {
            for arena in self.arenas_mut() {
                arena.reset_queue();
            }
            self.state = State::Configured;
        }
    }

    fn release_all<H: Handle + ?Sized>(&mut self, handle: &H) {
        for arena in self.arenas_mut() {
            if let Err(e) = arena.release(handle) {
                warn!("{}: failed to release buffers: {}", arena.buf_type(), e);
            }
        }
        self.state = State::Idle;
    }

    /// Turns the stream off and releases all buffers
    ///
    /// Every step is attempted even if an earlier one fails, and the stream is idle afterwards
    /// in any case. The first error is reported.
    pub fn stop<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<()> {
        if self.state != State::Streaming {
            return Err(Error::NotStreaming);
        }

        let mut result = Ok(());
        let types: Vec<Type> = self.types().collect();
        for typ in types {
            if let Err(e) = stream_off(handle, typ) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        for arena in self.arenas_mut() {
            if let Err(e) = arena.release(handle) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        self.state = State::Idle;
        debug!("stream off");
        result
    }

    /// Releases buffers of a configured but not streaming stream
    pub fn teardown<H: Handle + ?Sized>(&mut self, handle: &H) {
        if self.state == State::Configured {
            self.release_all(handle);
        }
    }

    fn ensure_streaming(&self) -> Result<()> {
        if self.state != State::Streaming {
            return Err(Error::NotStreaming);
        }
        Ok(())
    }

    /// Takes the next filled capture buffer from the driver
    pub fn dequeue<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<u32> {
        self.ensure_streaming()?;
        self.capture.dequeue(handle)
    }

    /// Returns a held capture buffer to the driver
    pub fn queue<H: Handle + ?Sized>(&mut self, handle: &H, index: u32) -> Result<()> {
        self.ensure_streaming()?;
        self.capture.queue(handle, index, 0)
    }

    /// Takes the next output buffer the driver has consumed
    pub fn dequeue_output<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<u32> {
        self.ensure_streaming()?;
        self.output
            .as_mut()
            .ok_or(Error::WrongMode)?
            .dequeue(handle)
    }

    /// Hands a filled output buffer to the driver
    pub fn queue_output<H: Handle + ?Sized>(
        &mut self,
        handle: &H,
        index: u32,
        bytesused: u32,
    ) -> Result<()> {
        self.ensure_streaming()?;
        self.output
            .as_mut()
            .ok_or(Error::WrongMode)?
            .queue(handle, index, bytesused)
    }

    pub fn output_data_mut(&mut self, index: u32) -> Result<&mut [u8]> {
        self.output
            .as_mut()
            .ok_or(Error::WrongMode)?
            .data_mut(index)
    }
}

fn stream_on<H: Handle + ?Sized>(handle: &H, typ: Type) -> Result<()> {
    handle::xfer(handle, vidioc::VIDIOC_STREAMON, &(typ as u32))
        .map(|_| ())
        .map_err(|source| Error::DeviceControl {
            op: "VIDIOC_STREAMON",
            source,
        })
}

fn stream_off<H: Handle + ?Sized>(handle: &H, typ: Type) -> Result<()> {
    handle::xfer(handle, vidioc::VIDIOC_STREAMOFF, &(typ as u32))
        .map(|_| ())
        .map_err(|source| Error::DeviceControl {
            op: "VIDIOC_STREAMOFF",
            source,
        })
}
