use std::fmt;

use log::warn;

use crate::error::{Error, Result};
use crate::handle::{self, Handle};
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// Automatic white balance, a boolean control
pub const V4L2_CID_AUTO_WHITE_BALANCE: u32 = 0x0098_090c;

/// Control data type
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Type {
    Integer,
    Boolean,
    Menu,
    Button,
    Integer64,
    CtrlClass,
    String,
    Bitmask,
    IntegerMenu,

    /* Compound types are >= 0x0100 */
    U8,
    U16,
    U32,
    Area,

    Unknown(u32),
}

impl From<u32> for Type {
    fn from(repr: u32) -> Self {
        match repr {
            1 => Self::Integer,
            2 => Self::Boolean,
            3 => Self::Menu,
            4 => Self::Button,
            5 => Self::Integer64,
            6 => Self::CtrlClass,
            7 => Self::String,
            8 => Self::Bitmask,
            9 => Self::IntegerMenu,

            0x0100 => Self::U8,
            0x0101 => Self::U16,
            0x0102 => Self::U32,
            0x0106 => Self::Area,
            repr => Self::Unknown(repr),
        }
    }
}

impl From<Type> for u32 {
    fn from(t: Type) -> Self {
        match t {
            Type::Integer => 1,
            Type::Boolean => 2,
            Type::Menu => 3,
            Type::Button => 4,
            Type::Integer64 => 5,
            Type::CtrlClass => 6,
            Type::String => 7,
            Type::Bitmask => 8,
            Type::IntegerMenu => 9,

            Type::U8 => 0x0100,
            Type::U16 => 0x0101,
            Type::U32 => 0x0102,
            Type::Area => 0x0106,
            Type::Unknown(t) => t,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
    pub struct Flags: u32 {
        const DISABLED              = 0x0001;
        const GRABBED               = 0x0002;
        const READ_ONLY             = 0x0004;
        const UPDATE                = 0x0008;
        const INACTIVE              = 0x0010;
        const SLIDER                = 0x0020;
        const WRITE_ONLY            = 0x0040;
        const VOLATILE              = 0x0080;
        const HAS_PAYLOAD           = 0x0100;
        const EXECUTE_ON_WRITE      = 0x0200;
        const MODIFY_LAYOUT         = 0x0400;

        const NEXT_CTRL             = 0x80000000;
        const NEXT_COMPOUND         = 0x40000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kind of value a control holds
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Integer,
    Boolean,
    Menu,
}

impl Kind {
    /// Classifies a control type; types without a single scalar value have no kind
    pub fn of(typ: Type) -> Option<Kind> {
        match typ {
            Type::Integer | Type::Integer64 => Some(Kind::Integer),
            Type::Boolean => Some(Kind::Boolean),
            Type::Menu => Some(Kind::Menu),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Integer => write!(f, "integer"),
            Kind::Boolean => write!(f, "boolean"),
            Kind::Menu => write!(f, "menu"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control description
///
/// Bounds are informational. Values passed to [`crate::Device::set_control`] are not checked
/// against them.
pub struct Description {
    /// Control identifier, used to get and set its value
    pub id: u32,
    /// Human readable name
    pub name: String,
    /// Kind of value
    pub kind: Kind,
    /// Data type as reported by the driver
    pub typ: Type,
    /// Minimum value
    pub minimum: i32,
    /// Maximum value
    pub maximum: i32,
    /// Step size between values
    pub step: i32,
    /// Value the control is reset to
    pub default: i32,
    /// Control flags
    pub flags: Flags,
}

impl Description {
    fn from_query(ctrl: v4l2_queryctrl) -> Option<Self> {
        let typ = Type::from(ctrl.type_);
        Some(Description {
            id: ctrl.id,
            name: ctrl.name,
            kind: Kind::of(typ)?,
            typ,
            minimum: ctrl.minimum,
            maximum: ctrl.maximum,
            step: ctrl.step,
            default: ctrl.default_value,
            flags: Flags::from(ctrl.flags),
        })
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:#010x}, {}): min {}, max {}, step {}, default {}",
            self.name, self.id, self.kind, self.minimum, self.maximum, self.step, self.default
        )
    }
}

/// Lazy walk over the controls of a device
///
/// Each step asks the driver for the control following the previous one. Disabled controls
/// and controls without a scalar value are skipped. The walk ends when the driver reports no
/// further controls; any other failure is yielded once and ends the walk as well.
pub struct Controls<'a, H: Handle + ?Sized> {
    handle: &'a H,
    last_id: u32,
    done: bool,
}

impl<'a, H: Handle + ?Sized> Controls<'a, H> {
    pub(crate) fn new(handle: &'a H) -> Self {
        Controls {
            handle,
            last_id: 0,
            done: false,
        }
    }
}

impl<'a, H: Handle + ?Sized> Iterator for Controls<'a, H> {
    type Item = Result<Description>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let query = v4l2_queryctrl {
                id: self.last_id | V4L2_CTRL_FLAG_NEXT_CTRL,
                ..Default::default()
            };

            let ctrl = match handle::xfer(self.handle, vidioc::VIDIOC_QUERYCTRL, &query) {
                Ok(ctrl) => ctrl,
                Err(e) => {
                    self.done = true;
                    if e.raw_os_error() == Some(libc::EINVAL) {
                        return None;
                    }
                    return Some(Err(Error::DeviceControl {
                        op: "VIDIOC_QUERYCTRL",
                        source: e,
                    }));
                }
            };

            // ids must grow, otherwise the driver would keep us here forever
            if ctrl.id <= self.last_id {
                warn!(
                    "control walk stalled at {:#010x}, stopping enumeration",
                    ctrl.id
                );
                self.done = true;
                return None;
            }
            self.last_id = ctrl.id;

            if ctrl.flags & V4L2_CTRL_FLAG_DISABLED != 0 {
                continue;
            }
            if let Some(desc) = Description::from_query(ctrl) {
                return Some(Ok(desc));
            }
        }

        None
    }
}

impl<'a, H: Handle + ?Sized> std::iter::FusedIterator for Controls<'a, H> {}

pub(crate) fn get<H: Handle + ?Sized>(handle: &H, id: u32) -> Result<i32> {
    let ctrl = v4l2_control { id, value: 0 };
    handle::xfer(handle, vidioc::VIDIOC_G_CTRL, &ctrl)
        .map(|ctrl| ctrl.value)
        .map_err(|source| Error::ControlAccessError { id, source })
}

pub(crate) fn set<H: Handle + ?Sized>(handle: &H, id: u32, value: i32) -> Result<()> {
    let ctrl = v4l2_control { id, value };
    handle::xfer(handle, vidioc::VIDIOC_S_CTRL, &ctrl)
        .map(|_| ())
        .map_err(|source| Error::ControlAccessError { id, source })
}
