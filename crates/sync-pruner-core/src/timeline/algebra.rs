use super::{Interval, Timeline};

/// Intersection of two timelines. Zero-length overlaps are dropped.
pub fn intersect_pair(a: &Timeline, b: &Timeline) -> Timeline {
    let (a, b) = (a.intervals(), b.intervals());
    let mut result = Timeline::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);

        if start < end {
            result.push(Interval::new(start, end));
        }

        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }

    result
}

/// Intersection of every timeline in `timelines`. An empty list yields an
/// empty timeline.
pub fn intersect_all(timelines: &[Timeline]) -> Timeline {
    let Some((first, rest)) = timelines.split_first() else {
        return Timeline::new();
    };

    let mut current = first.clone();
    for other in rest {
        if current.is_empty() {
            break;
        }
        current = intersect_pair(&current, other);
    }
    current
}

/// Keep the intervals lasting at least `min_duration` seconds.
pub fn filter_by_min_duration(timeline: &Timeline, min_duration: f64) -> Timeline {
    Timeline::from_sorted(
        timeline
            .intervals()
            .iter()
            .filter(|iv| iv.duration() >= min_duration)
            .copied()
            .collect(),
    )
}
