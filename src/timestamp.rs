use std::{fmt, time};

use crate::v4l2::videodev::v4l2_timeval;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Timestamp consisting of a seconds and a microseconds component
pub struct Timestamp {
    pub sec: i64,
    pub usec: i64,
}

impl Timestamp {
    /// Returns a timestamp representation
    ///
    /// # Arguments
    ///
    /// * `sec` - Seconds
    /// * `usec` - Microseconds
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::Timestamp;
    /// let ts = Timestamp::new(5, 5);
    /// ```
    pub fn new(sec: i64, usec: i64) -> Self {
        Timestamp { sec, usec }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let floating: f64 = self.sec as f64 + self.usec as f64 / 1_000_000.0;
        write!(f, "{} [s]", floating)
    }
}

impl From<v4l2_timeval> for Timestamp {
    fn from(tv: v4l2_timeval) -> Self {
        Timestamp {
            sec: tv.tv_sec,
            usec: tv.tv_usec,
        }
    }
}

impl From<Timestamp> for v4l2_timeval {
    fn from(ts: Timestamp) -> Self {
        v4l2_timeval {
            tv_sec: ts.sec,
            tv_usec: ts.usec,
        }
    }
}

impl From<time::Duration> for Timestamp {
    fn from(duration: time::Duration) -> Self {
        Timestamp::new(
            duration.as_secs() as i64,
            duration.subsec_micros() as i64,
        )
    }
}

impl From<Timestamp> for time::Duration {
    fn from(ts: Timestamp) -> Self {
        time::Duration::new(ts.sec.max(0) as u64, (ts.usec.clamp(0, 999_999) * 1000) as u32)
    }
}
