//! Kernel facing layer: libc primitives, request codes and the record codec

pub mod api;
pub use api::*;

pub mod layout;
pub mod videodev;
pub mod vidioc;
