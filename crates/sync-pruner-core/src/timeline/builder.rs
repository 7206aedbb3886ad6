use super::{Interval, Timeline};

/// Turn raw sample timestamps into a timeline, opening a new segment wherever
/// consecutive samples are more than `gap_threshold` seconds apart.
///
/// The input does not need to be sorted. A lone sample yields `[t, t]`.
pub fn build_timeline(timestamps: &[f64], gap_threshold: f64) -> Timeline {
    let mut sorted = timestamps.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut timeline = Timeline::new();
    let Some((&first, rest)) = sorted.split_first() else {
        return timeline;
    };

    let mut seg_start = first;
    let mut last = first;
    for &t in rest {
        if t - last > gap_threshold {
            timeline.push(Interval::new(seg_start, last));
            seg_start = t;
        }
        last = t;
    }
    timeline.push(Interval::new(seg_start, last));

    timeline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_segmentation() {
        let tl = build_timeline(&[0.0, 1.0, 2.0, 20.0, 21.0, 22.0], 10.0);
        assert_eq!(tl, Timeline::from(vec![(0.0, 2.0), (20.0, 22.0)]));
    }

    #[test]
    fn test_unsorted_input() {
        let tl = build_timeline(&[21.0, 0.0, 22.0, 2.0, 1.0, 20.0], 10.0);
        assert_eq!(tl, Timeline::from(vec![(0.0, 2.0), (20.0, 22.0)]));
    }

    #[test]
    fn test_single_timestamp() {
        let tl = build_timeline(&[42.0], 15.0);
        assert_eq!(tl, Timeline::from(vec![(42.0, 42.0)]));
    }

    #[test]
    fn test_empty_input() {
        assert!(build_timeline(&[], 15.0).is_empty());
    }

    #[test]
    fn test_gap_equal_to_threshold_does_not_split() {
        let tl = build_timeline(&[0.0, 15.0, 30.0], 15.0);
        assert_eq!(tl, Timeline::from(vec![(0.0, 30.0)]));
    }

    #[test]
    fn test_gap_just_over_threshold_splits() {
        let tl = build_timeline(&[0.0, 15.5, 16.0], 15.0);
        assert_eq!(tl, Timeline::from(vec![(0.0, 0.0), (15.5, 16.0)]));
    }

    #[test]
    fn test_duplicate_timestamps() {
        let tl = build_timeline(&[5.0, 5.0, 5.0, 6.0], 15.0);
        assert_eq!(tl, Timeline::from(vec![(5.0, 6.0)]));
    }
}
