use std::io;

use log::{debug, trace, warn};

use crate::buffer::{Metadata, State, Type};
use crate::error::{Error, Result};
use crate::handle::{self, Handle};
use crate::memory::{Memory, Mmap};
use crate::v4l2::layout::PLANE_SIZE;
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// A single pooled buffer
#[derive(Debug)]
pub(crate) struct Buffer {
    region: Option<Mmap>,
    state: State,
    meta: Metadata,
    /// Start of the payload within the region, as reported on dequeue
    data_offset: u32,
}

impl Buffer {
    pub fn meta(&self) -> &Metadata {
        &self.meta
    }
}

/// Pool of memory mapped buffers of one buffer type
///
/// The arena is the only owner of the mapped regions. They are handed back to the device
/// handle in [`Arena::release`], never anywhere else.
#[derive(Debug)]
pub(crate) struct Arena {
    bufs: Vec<Buffer>,
    buf_type: Type,
}

impl Arena {
    /// Returns an empty buffer pool
    ///
    /// # Arguments
    ///
    /// * `buf_type` - Type of the buffers
    pub fn new(buf_type: Type) -> Self {
        Arena {
            bufs: Vec::new(),
            buf_type,
        }
    }

    pub fn buf_type(&self) -> Type {
        self.buf_type
    }

    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    /// Number of buffers currently owned by the driver
    pub fn queued(&self) -> usize {
        self.bufs
            .iter()
            .filter(|buf| buf.state == State::Queued)
            .count()
    }

    pub fn get(&self, index: u32) -> Result<&Buffer> {
        self.bufs.get(index as usize).ok_or(Error::BufferIndex(index))
    }

    fn request<H: Handle + ?Sized>(&self, handle: &H, count: u32) -> io::Result<u32> {
        let reqbufs = v4l2_requestbuffers {
            count,
            type_: self.buf_type as u32,
            memory: Memory::Mmap as u32,
            ..Default::default()
        };
        let reqbufs = handle::xfer(handle, vidioc::VIDIOC_REQBUFS, &reqbufs)?;
        Ok(reqbufs.count)
    }

    /// Passes a buffer descriptor through the control channel
    ///
    /// Multi-planar buffer types carry a single plane. Its descriptor array lives on this
    /// stack frame and is referenced by address from the buffer record, so it must not leave
    /// this function. Single-planar answers are folded into an equivalent plane descriptor so
    /// callers can treat both kinds alike.
    fn transfer<H: Handle + ?Sized>(
        &self,
        handle: &H,
        request: vidioc::_IOC_TYPE,
        mut desc: v4l2_buffer,
        plane: v4l2_plane,
    ) -> io::Result<(v4l2_buffer, v4l2_plane)> {
        if !self.buf_type.is_multiplanar() {
            let desc = handle::xfer(handle, request, &desc)?;
            let mem_offset = match desc.m {
                v4l2_buffer_m::Offset(offset) => offset,
                _ => 0,
            };
            let plane = v4l2_plane {
                bytesused: desc.bytesused,
                length: desc.length,
                mem_offset,
                data_offset: 0,
            };
            return Ok((desc, plane));
        }

        let mut planes = [0u8; PLANE_SIZE];
        plane.encode(&mut planes);
        desc.m = v4l2_buffer_m::Planes(planes.as_mut_ptr() as usize);
        desc.length = 1;
        let desc = handle::xfer(handle, request, &desc)?;
        Ok((desc, v4l2_plane::decode(&planes)))
    }

    fn descriptor(&self, index: u32) -> v4l2_buffer {
        v4l2_buffer {
            index,
            type_: self.buf_type as u32,
            memory: Memory::Mmap as u32,
            ..Default::default()
        }
    }

    fn map<H: Handle + ?Sized>(&self, handle: &H, index: u32) -> io::Result<Buffer> {
        let (_, plane) = self.transfer(
            handle,
            vidioc::VIDIOC_QUERYBUF,
            self.descriptor(index),
            v4l2_plane::default(),
        )?;
        let region = handle.mmap(plane.mem_offset, plane.length as usize)?;
        trace!(
            "{}: mapped buffer {} ({} bytes at offset {:#x})",
            self.buf_type,
            index,
            plane.length,
            plane.mem_offset
        );

        Ok(Buffer {
            region: Some(region),
            state: State::Mapped,
            meta: Metadata::default(),
            data_offset: 0,
        })
    }

    /// Requests buffers from the driver and maps every granted one
    ///
    /// Returns the number of buffers granted, which may be smaller than `count`. If querying or
    /// mapping any buffer fails, the ones mapped so far are unmapped and the allocation is
    /// returned to the driver before the error is reported.
    ///
    /// # Arguments
    ///
    /// * `handle` - Device to allocate the buffers on
    /// * `count` - Desired number of buffers
    pub fn allocate<H: Handle + ?Sized>(&mut self, handle: &H, count: u32) -> Result<u32> {
        if !self.bufs.is_empty() {
            self.release(handle)?;
        }

        let granted = self
            .request(handle, count)
            .map_err(|source| Error::DeviceControl {
                op: "VIDIOC_REQBUFS",
                source,
            })?;
        if granted == 0 {
            warn!("{}: driver granted no buffers", self.buf_type);
        } else {
            debug!(
                "{}: driver granted {} of {} buffers",
                self.buf_type, granted, count
            );
        }

        for index in 0..granted {
            match self.map(handle, index) {
                Ok(buf) => self.bufs.push(buf),
                Err(source) => {
                    self.rollback(handle);
                    return Err(Error::BufferMapError { index, source });
                }
            }
        }

        Ok(granted)
    }

    fn rollback<H: Handle + ?Sized>(&mut self, handle: &H) {
        for (index, buf) in self.bufs.iter_mut().enumerate() {
            if let Some(region) = buf.region.take() {
                if let Err(e) = handle.munmap(region) {
                    warn!("{}: failed to unmap buffer {}: {}", self.buf_type, index, e);
                }
            }
        }
        self.bufs.clear();

        if let Err(e) = self.request(handle, 0) {
            warn!("{}: failed to free buffers: {}", self.buf_type, e);
        }
    }

    /// Unmaps every buffer and returns the allocation to the driver
    ///
    /// Calling this on an empty pool is a no-op. Every buffer is attempted even if unmapping
    /// an earlier one fails; the first error is reported.
    pub fn release<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<()> {
        if self.bufs.is_empty() {
            return Ok(());
        }

        let mut result = Ok(());
        for buf in self.bufs.iter_mut() {
            if let Some(region) = buf.region.take() {
                if let Err(e) = handle.munmap(region) {
                    if result.is_ok() {
                        result = Err(Error::Io(e));
                    }
                }
            }
        }
        self.bufs.clear();

        if let Err(source) = self.request(handle, 0) {
            if result.is_ok() {
                result = Err(Error::DeviceControl {
                    op: "VIDIOC_REQBUFS",
                    source,
                });
            }
        }

        debug!("{}: released buffers", self.buf_type);
        result
    }

    /// Hands a buffer to the driver
    ///
    /// Only buffers that are mapped but not yet queued, or held by the consumer, may be queued.
    ///
    /// # Arguments
    ///
    /// * `index` - Buffer index
    /// * `bytesused` - Payload length for output buffers, zero meaning the whole buffer
    pub fn queue<H: Handle + ?Sized>(&mut self, handle: &H, index: u32, bytesused: u32) -> Result<()> {
        let state = self.get(index)?.state;
        if state != State::Mapped && state != State::Held {
            return Err(Error::BufferState { index, state });
        }

        let desc = v4l2_buffer {
            bytesused,
            field: V4L2_FIELD_ANY,
            ..self.descriptor(index)
        };
        let plane = v4l2_plane {
            bytesused,
            ..Default::default()
        };
        self.transfer(handle, vidioc::VIDIOC_QBUF, desc, plane)
            .map_err(|source| Error::DeviceControl {
                op: "VIDIOC_QBUF",
                source,
            })?;

        self.bufs[index as usize].state = State::Queued;
        trace!("{}: queued buffer {}", self.buf_type, index);
        Ok(())
    }

    /// Hands every mapped, not yet queued buffer to the driver
    ///
    /// Buffers held by the consumer are left alone.
    pub fn queue_all<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<()> {
        for index in 0..self.bufs.len() as u32 {
            if self.bufs[index as usize].state == State::Mapped {
                self.queue(handle, index, 0)?;
            }
        }
        Ok(())
    }

    /// Takes the next buffer the driver is done with
    ///
    /// Returns its index; the buffer is held by the consumer afterwards.
    pub fn dequeue<H: Handle + ?Sized>(&mut self, handle: &H) -> Result<u32> {
        let (desc, plane) = self
            .transfer(
                handle,
                vidioc::VIDIOC_DQBUF,
                self.descriptor(0),
                v4l2_plane::default(),
            )
            .map_err(|source| Error::DeviceControl {
                op: "VIDIOC_DQBUF",
                source,
            })?;

        let index = desc.index;
        let buf_type = self.buf_type;
        let buf = self
            .bufs
            .get_mut(index as usize)
            .ok_or(Error::BufferIndex(index))?;

        // the driver gave the buffer up, so the consumer holds it whatever the pool believed
        let state = buf.state;
        buf.state = State::Held;
        buf.meta = Metadata {
            bytesused: plane.bytesused,
            flags: desc.flags.into(),
            timestamp: desc.timestamp.into(),
            sequence: desc.sequence,
        };
        buf.data_offset = plane.data_offset;
        if state != State::Queued {
            warn!("{}: driver returned buffer {} while {}", buf_type, index, state);
            return Err(Error::BufferState { index, state });
        }

        trace!("{}: dequeued buffer {} ({})", buf_type, index, buf.meta);
        Ok(index)
    }

    /// Returns the payload of a held buffer
    ///
    /// The payload starts at the plane's data offset and ends at the length reported by the
    /// driver, which includes the offset.
    pub fn data(&self, index: u32) -> Result<&[u8]> {
        let buf = self.held(index)?;
        let data: &[u8] = buf.region.as_ref().map(Mmap::as_slice).unwrap_or_default();
        let used = (buf.meta.bytesused as usize).min(data.len());
        let start = (buf.data_offset as usize).min(used);
        Ok(&data[start..used])
    }

    /// Returns the whole writable region of a held buffer
    pub fn data_mut(&mut self, index: u32) -> Result<&mut [u8]> {
        self.held(index)?;
        let buf = &mut self.bufs[index as usize];
        Ok(buf.region.as_mut().map(Mmap::as_mut_slice).unwrap_or_default())
    }

    fn held(&self, index: u32) -> Result<&Buffer> {
        let buf = self.get(index)?;
        if buf.state != State::Held {
            return Err(Error::BufferState {
                index,
                state: buf.state,
            });
        }
        Ok(buf)
    }

    /// Returns every queued buffer to the mapped state
    ///
    /// Turning the stream off makes the driver drop all queued buffers, so the pool has to
    /// forget about them as well.
    pub fn reset_queue(&mut self) {
        for buf in self.bufs.iter_mut() {
            if buf.state == State::Queued || buf.state == State::Held {
                buf.state = State::Mapped;
            }
        }
    }
}
