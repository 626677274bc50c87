use std::fmt;

use crate::format::FourCC;
use crate::v4l2::videodev::{v4l2_frmsize, v4l2_frmsizeenum};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Frame size as returned by [`crate::v4l2::vidioc::VIDIOC_ENUM_FRAMESIZES`]
pub struct FrameSize {
    pub index: u32,
    pub fourcc: FourCC,
    pub size: FrameSizeEnum,
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.size.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSizeEnum {
    Discrete(Discrete),
    Stepwise(Stepwise),
    /// The driver reported a size type that is not resolved, e.g. continuous ranges
    Unsupported(u32),
}

impl FrameSizeEnum {
    /// Returns the sizes as a range
    ///
    /// Discrete sizes become a range with equal bounds and zero steps. Unsupported size types
    /// have no range.
    pub fn to_range(&self) -> Option<Stepwise> {
        match *self {
            Self::Discrete(discrete) => Some(Stepwise {
                min_width: discrete.width,
                max_width: discrete.width,
                step_width: 0,
                min_height: discrete.height,
                max_height: discrete.height,
                step_height: 0,
            }),
            Self::Stepwise(stepwise) => Some(stepwise),
            Self::Unsupported(_) => None,
        }
    }

    /// Expands the sizes into every discrete size they describe
    pub fn to_discrete(self) -> impl IntoIterator<Item = Discrete> {
        match self {
            Self::Discrete(discrete) => vec![discrete],
            Self::Stepwise(stepwise) => {
                let mut discrete = Vec::new();

                for width in (stepwise.min_width..=stepwise.max_width)
                    .step_by(stepwise.step_width.max(1) as usize)
                {
                    for height in (stepwise.min_height..=stepwise.max_height)
                        .step_by(stepwise.step_height.max(1) as usize)
                    {
                        discrete.push(Discrete { width, height });
                    }
                }

                discrete
            }
            Self::Unsupported(_) => Vec::new(),
        }
    }
}

impl fmt::Display for FrameSizeEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSizeEnum::Discrete(val) => write!(f, "Discrete({})", val)?,
            FrameSizeEnum::Stepwise(val) => write!(f, "Stepwise({})", val)?,
            FrameSizeEnum::Unsupported(typ) => write!(f, "Unsupported(type {})", typ)?,
        }

        Ok(())
    }
}

impl From<v4l2_frmsize> for FrameSizeEnum {
    fn from(size: v4l2_frmsize) -> Self {
        match size {
            v4l2_frmsize::Discrete(discrete) => FrameSizeEnum::Discrete(Discrete {
                width: discrete.width,
                height: discrete.height,
            }),
            v4l2_frmsize::Stepwise(stepwise) => FrameSizeEnum::Stepwise(Stepwise {
                min_width: stepwise.min_width,
                max_width: stepwise.max_width,
                step_width: stepwise.step_width,
                min_height: stepwise.min_height,
                max_height: stepwise.max_height,
                step_height: stepwise.step_height,
            }),
            other => FrameSizeEnum::Unsupported(other.tag()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discrete {
    /// Width of the frame (in pixels).
    pub width: u32,
    /// Height of the frame (in pixels).
    pub height: u32,
}

impl fmt::Display for Discrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stepwise {
    /// Minimum frame width (in pixels).
    pub min_width: u32,
    /// Maximum frame width (in pixels).
    pub max_width: u32,
    /// Frame width step size (in pixels).
    pub step_width: u32,
    /// Minimum frame height (in pixels).
    pub min_height: u32,
    /// Maximum frame height (in pixels).
    pub max_height: u32,
    /// Frame height step size (in pixels).
    pub step_height: u32,
}

impl fmt::Display for Stepwise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} - {}x{} with step {}/{}",
            self.min_width,
            self.min_height,
            self.max_width,
            self.max_height,
            self.step_width,
            self.step_height,
        )?;
        Ok(())
    }
}

impl From<v4l2_frmsizeenum> for FrameSize {
    fn from(desc: v4l2_frmsizeenum) -> Self {
        FrameSize {
            index: desc.index,
            fourcc: FourCC::from(desc.pixel_format),
            size: FrameSizeEnum::from(desc.size),
        }
    }
}
