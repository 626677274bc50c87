use std::fmt;

const FIELD_ANY: u32 = 0;
const FIELD_NONE: u32 = 1;
const FIELD_INTERLACED: u32 = 4;
const FIELD_ALTERNATE: u32 = 7;

/// Line interlacing of a frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldOrder {
    /// Left to the driver
    Any,
    Progressive,
    /// Both fields interleaved line by line in one buffer
    Interlaced,
    /// One field per buffer, top and bottom taking turns
    Alternate,
    /// Any of the remaining driver layouts, by code
    Other(u32),
}

impl From<u32> for FieldOrder {
    fn from(code: u32) -> Self {
        match code {
            FIELD_ANY => FieldOrder::Any,
            FIELD_NONE => FieldOrder::Progressive,
            FIELD_INTERLACED => FieldOrder::Interlaced,
            FIELD_ALTERNATE => FieldOrder::Alternate,
            code => FieldOrder::Other(code),
        }
    }
}

impl From<FieldOrder> for u32 {
    fn from(order: FieldOrder) -> Self {
        match order {
            FieldOrder::Any => FIELD_ANY,
            FieldOrder::Progressive => FIELD_NONE,
            FieldOrder::Interlaced => FIELD_INTERLACED,
            FieldOrder::Alternate => FIELD_ALTERNATE,
            FieldOrder::Other(code) => code,
        }
    }
}

impl fmt::Display for FieldOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOrder::Any => write!(f, "any"),
            FieldOrder::Progressive => write!(f, "progressive"),
            FieldOrder::Interlaced => write!(f, "interlaced"),
            FieldOrder::Alternate => write!(f, "alternating fields"),
            FieldOrder::Other(code) => write!(f, "field layout {}", code),
        }
    }
}
