use crate::classifier::ProbabilityEstimate;
use crate::error::{EegError, Result};
use crate::types::{ClassificationReport, ClassificationSegment, TaskType};

/// Turns ensemble statistics and segment sample ranges into report records
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Ordered segments with times in whole seconds (start floored, stop ceiled)
    pub fn build(
        &self,
        estimate: &ProbabilityEstimate,
        segment_cuts: &[(usize, usize)],
        sfreq: f64,
    ) -> Result<Vec<ClassificationSegment>> {
        if estimate.mean.len() != segment_cuts.len() || estimate.std.len() != segment_cuts.len() {
            return Err(EegError::ShapeMismatch(format!(
                "{} probability means / {} stds for {} segments",
                estimate.mean.len(),
                estimate.std.len(),
                segment_cuts.len()
            )));
        }
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(EegError::InvalidConfig(format!(
                "Invalid sampling frequency {}",
                sfreq
            )));
        }

        let segments = segment_cuts
            .iter()
            .zip(estimate.mean.iter().zip(&estimate.std))
            .enumerate()
            .map(|(nr, (&(start, end), (&mean, &std)))| ClassificationSegment {
                nr,
                probability_mean: mean,
                probability_std: std,
                start_time: (start as f64 / sfreq).floor() as u64,
                stop_time: (end as f64 / sfreq).ceil() as u64,
            })
            .collect();
        Ok(segments)
    }

    pub fn report(
        &self,
        task: TaskType,
        estimate: &ProbabilityEstimate,
        segment_cuts: &[(usize, usize)],
        sfreq: f64,
    ) -> Result<ClassificationReport> {
        Ok(ClassificationReport {
            task,
            segments: self.build(estimate, segment_cuts, sfreq)?,
        })
    }
}

/// Segments with `prob >= min_probability` and, when given, `std <= max_std`.
/// Order is preserved.
pub fn filter_segments(
    segments: &[ClassificationSegment],
    min_probability: f64,
    max_std: Option<f64>,
) -> Vec<ClassificationSegment> {
    segments
        .iter()
        .filter(|seg| {
            seg.probability_mean >= min_probability
                && max_std.map_or(true, |limit| seg.probability_std <= limit)
        })
        .cloned()
        .collect()
}

/// Binary label per segment: `prob > prob_threshold` and, when given,
/// `std < std_threshold`
pub fn label_segments(
    segments: &[ClassificationSegment],
    prob_threshold: f64,
    std_threshold: Option<f64>,
) -> Vec<bool> {
    segments
        .iter()
        .map(|seg| {
            seg.probability_mean > prob_threshold
                && std_threshold.map_or(true, |limit| seg.probability_std < limit)
        })
        .collect()
}

impl ClassificationReport {
    /// Copy of the report keeping only segments that pass `filter_segments`
    pub fn filtered(&self, min_probability: f64, max_std: Option<f64>) -> Self {
        Self {
            task: self.task,
            segments: filter_segments(&self.segments, min_probability, max_std),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_segments() -> Vec<ClassificationSegment> {
        let estimate = ProbabilityEstimate {
            mean: vec![0.95, 0.55, 0.67],
            std: vec![0.006, 0.006, 0.01],
        };
        ResultAggregator::new()
            .build(&estimate, &[(0, 160), (160, 320), (320, 480)], 10.0)
            .unwrap()
    }

    #[test]
    fn test_build_times_and_order() {
        let segments = example_segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].nr, 1);
        assert_eq!((segments[1].start_time, segments[1].stop_time), (16, 32));
        assert_eq!(segments[2].probability_std, 0.01);
    }

    #[test]
    fn test_fractional_times_round_outward() {
        let estimate = ProbabilityEstimate {
            mean: vec![0.1],
            std: vec![0.0],
        };
        let segments = ResultAggregator::new()
            .build(&estimate, &[(25, 55)], 10.0)
            .unwrap();
        assert_eq!(segments[0].start_time, 2);
        assert_eq!(segments[0].stop_time, 6);
    }

    #[test]
    fn test_length_mismatch() {
        let estimate = ProbabilityEstimate {
            mean: vec![0.1, 0.2],
            std: vec![0.0, 0.0],
        };
        assert!(matches!(
            ResultAggregator::new().build(&estimate, &[(0, 10)], 10.0),
            Err(EegError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_filter_by_probability() {
        let kept = filter_segments(&example_segments(), 0.6, None);
        let nrs: Vec<usize> = kept.iter().map(|s| s.nr).collect();
        assert_eq!(nrs, vec![0, 2]);
    }

    #[test]
    fn test_filter_by_probability_and_std() {
        let kept = filter_segments(&example_segments(), 0.6, Some(0.008));
        let nrs: Vec<usize> = kept.iter().map(|s| s.nr).collect();
        assert_eq!(nrs, vec![0]);
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let kept = filter_segments(&example_segments(), 0.55, Some(0.006));
        let nrs: Vec<usize> = kept.iter().map(|s| s.nr).collect();
        assert_eq!(nrs, vec![0, 1]);
    }

    #[test]
    fn test_labels_use_strict_thresholds() {
        let segments = example_segments();
        assert_eq!(label_segments(&segments, 0.55, None), vec![true, false, true]);
        assert_eq!(
            label_segments(&segments, 0.5, Some(0.01)),
            vec![true, true, false]
        );
    }

    #[test]
    fn test_report_filtered() {
        let report = ClassificationReport {
            task: TaskType::Abnormal,
            segments: example_segments(),
        };
        let filtered = report.filtered(0.9, None);
        assert_eq!(filtered.task, TaskType::Abnormal);
        assert_eq!(filtered.segments.len(), 1);
    }
}
