/// Reduction primitives shared by the aggregation engine
use time::OffsetDateTime;

use crate::error::{CompactionError, Result};
use crate::models::{Range, TimeSpan};

impl Range {
    /// Reduce samples to min/max/avg, ignoring missing and non-finite values
    ///
    /// When no finite value remains the range is `{0, 0, None}`: an absent
    /// average is a valid outcome for a sensor the station does not have,
    /// not an error.
    pub fn from_samples<I>(samples: I) -> Range
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in samples.into_iter().flatten().filter(|v| v.is_finite()) {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        if count == 0 {
            return Range {
                min: 0.0,
                max: 0.0,
                avg: None,
            };
        }

        // Rounding in the running sum can push the mean a hair outside [min, max]
        let avg = (sum / count as f64).clamp(min, max);

        Range {
            min,
            max,
            avg: Some(avg),
        }
    }
}

impl TimeSpan {
    /// Earliest and latest of a non-empty set of timestamps
    pub fn from_timestamps<I>(timestamps: I) -> Result<TimeSpan>
    where
        I: IntoIterator<Item = OffsetDateTime>,
    {
        let mut iter = timestamps.into_iter();
        let first = iter.next().ok_or(CompactionError::EmptyInput("time span"))?;

        let (earliest, latest) = iter.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));

        Ok(TimeSpan { earliest, latest })
    }
}
