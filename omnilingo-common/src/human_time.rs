//! Human-readable elapsed time and throughput formatting
//!
//! Used for the end-of-run summary lines.

use std::fmt;
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 86_400;

/// Format an elapsed duration as `H:MM:SS.mmm`, or `Dd-H:MM:SS.mmm` past one day.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use omnilingo_common::human_time::format_elapsed;
///
/// assert_eq!(format_elapsed(Duration::from_millis(62_345)), "0:01:02.345");
/// assert_eq!(format_elapsed(Duration::from_secs(3661)), "1:01:01.000");
/// assert_eq!(format_elapsed(Duration::from_secs(90_000)), "1d-1:00:00.000");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();

    let days = total_secs / SECONDS_PER_DAY;
    let hours = (total_secs % SECONDS_PER_DAY) / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if days > 0 {
        format!("{}d-{}:{:02}:{:02}.{:03}", days, hours, mins, secs, millis)
    } else {
        format!("{}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
    }
}

/// Processing speed over a whole run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    /// Seconds spent per thousand records
    pub secs_per_thousand: f64,
    /// Records handled per second
    pub records_per_sec: f64,
}

impl Throughput {
    /// Compute throughput, `None` when there is nothing to divide by
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use omnilingo_common::human_time::Throughput;
    ///
    /// let t = Throughput::compute(2000, Duration::from_secs(10)).unwrap();
    /// assert_eq!(t.to_string(), "~5 sec/1000 recs / ~200 recs/sec");
    /// assert!(Throughput::compute(0, Duration::from_secs(1)).is_none());
    /// ```
    pub fn compute(records: u64, elapsed: Duration) -> Option<Self> {
        let secs = elapsed.as_secs_f64();
        if records == 0 || secs <= 0.0 {
            return None;
        }

        Some(Self {
            secs_per_thousand: 1000.0 * secs / records as f64,
            records_per_sec: records as f64 / secs,
        })
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Truncated, not rounded: the summary reports whole units
        write!(
            f,
            "~{} sec/1000 recs / ~{} recs/sec",
            self.secs_per_thousand as u64, self.records_per_sec as u64
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_second() {
        assert_eq!(format_elapsed(Duration::from_millis(0)), "0:00:00.000");
        assert_eq!(format_elapsed(Duration::from_millis(999)), "0:00:00.999");
    }

    #[test]
    fn test_hour_boundaries() {
        assert_eq!(format_elapsed(Duration::from_secs(3599)), "0:59:59.000");
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "1:00:00.000");
        assert_eq!(format_elapsed(Duration::from_secs(86_399)), "23:59:59.000");
        assert_eq!(format_elapsed(Duration::from_secs(86_400)), "1d-0:00:00.000");
    }

    #[test]
    fn test_throughput_truncates() {
        // 2500 records in 7.5s: 3.0 sec/1000, 333.33 recs/sec
        let t = Throughput::compute(2500, Duration::from_millis(7500)).unwrap();
        assert_eq!(t.to_string(), "~3 sec/1000 recs / ~333 recs/sec");
    }

    #[test]
    fn test_throughput_zero_elapsed() {
        assert!(Throughput::compute(10, Duration::ZERO).is_none());
    }
}
