use std::fmt;

use crate::v4l2::videodev::v4l2_fract;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Fraction used for timing settings
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    /// Returns a fraction representation
    ///
    /// # Arguments
    ///
    /// * `num` - Numerator
    /// * `denom` - Denominator
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::Fraction;
    /// let frac = Fraction::new(1000, 30000);
    /// ```
    pub fn new(num: u32, denom: u32) -> Self {
        Fraction {
            numerator: num,
            denominator: denom,
        }
    }

    /// Returns the frame interval `1/fps` with a numerator of 1000
    ///
    /// The fixed numerator keeps fractional rates such as 29.97 expressible.
    pub fn from_fps(fps: f32) -> Self {
        Fraction::new(1000, (1000.0 * fps).round() as u32)
    }

    /// Interprets the fraction as a frame interval and returns frames per second
    ///
    /// Returns `None` if either component is zero.
    pub fn fps(&self) -> Option<f32> {
        if self.numerator == 0 || self.denominator == 0 {
            return None;
        }
        Some(self.denominator as f32 / self.numerator as f32)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl From<v4l2_fract> for Fraction {
    fn from(frac: v4l2_fract) -> Self {
        Self {
            numerator: frac.numerator,
            denominator: frac.denominator,
        }
    }
}

impl From<Fraction> for v4l2_fract {
    fn from(fraction: Fraction) -> Self {
        Self {
            numerator: fraction.numerator,
            denominator: fraction.denominator,
        }
    }
}
