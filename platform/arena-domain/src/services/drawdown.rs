use crate::value_objects::equity_point::EquityPoint;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawdownSegment {
    pub peak_ts: i64,
    pub trough_ts: i64,
    pub recovery_ts: Option<i64>,
    pub depth_pct: f64,
    pub duration_bars: u64,
}

pub fn drawdown_series(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|v| {
            if *v > peak {
                peak = *v;
            }
            if peak > 0.0 {
                ((peak - v) / peak).max(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

pub fn max_drawdown(values: &[f64]) -> f64 {
    drawdown_series(values).into_iter().fold(0.0, f64::max)
}

/// Drawdown episodes sorted deepest first, truncated to `top_n`.
pub fn drawdown_segments(points: &[EquityPoint], top_n: usize) -> Vec<DrawdownSegment> {
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let mut segments: Vec<DrawdownSegment> = Vec::new();
    let mut peak_equity = first.equity;
    let mut peak_ts = first.timestamp;
    let mut peak_index = 0usize;
    let mut trough_equity = first.equity;
    let mut trough_ts = first.timestamp;
    let mut in_drawdown = false;

    let depth = |peak: f64, trough: f64| {
        if peak > 0.0 {
            ((peak - trough) / peak).max(0.0)
        } else {
            0.0
        }
    };

    for (i, p) in points.iter().enumerate().skip(1) {
        if p.equity >= peak_equity {
            if in_drawdown {
                segments.push(DrawdownSegment {
                    peak_ts,
                    trough_ts,
                    recovery_ts: Some(p.timestamp),
                    depth_pct: depth(peak_equity, trough_equity),
                    duration_bars: (i - 1 - peak_index) as u64,
                });
            }
            peak_equity = p.equity;
            peak_ts = p.timestamp;
            peak_index = i;
            trough_equity = p.equity;
            trough_ts = p.timestamp;
            in_drawdown = false;
            continue;
        }

        in_drawdown = true;
        if p.equity <= trough_equity {
            trough_equity = p.equity;
            trough_ts = p.timestamp;
        }
    }

    if in_drawdown {
        segments.push(DrawdownSegment {
            peak_ts,
            trough_ts,
            recovery_ts: None,
            depth_pct: depth(peak_equity, trough_equity),
            duration_bars: (points.len() - 1 - peak_index) as u64,
        });
    }

    segments.sort_by(|a, b| b.depth_pct.total_cmp(&a.depth_pct));
    segments.truncate(top_n);
    segments
}

/// Longest run of bars spent below a prior peak.
pub fn max_drawdown_duration(points: &[EquityPoint]) -> u64 {
    let mut peak = f64::NEG_INFINITY;
    let mut current = 0u64;
    let mut longest = 0u64;
    for p in points {
        if p.equity >= peak {
            peak = p.equity;
            current = 0;
        } else {
            current += 1;
            longest = longest.max(current);
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        EquityPoint::from_values(values)
    }

    #[test]
    fn series_tracks_running_peak() {
        let dd = drawdown_series(&[100.0, 120.0, 90.0, 130.0]);
        assert_eq!(dd[0], 0.0);
        assert_eq!(dd[1], 0.0);
        assert!((dd[2] - 0.25).abs() < 1e-12);
        assert_eq!(dd[3], 0.0);
        assert!((max_drawdown(&[100.0, 120.0, 90.0, 130.0]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn segments_sorted_by_depth_and_open_segment_has_no_recovery() {
        let points = curve(&[100.0, 90.0, 100.0, 110.0, 80.0, 85.0]);
        let segments = drawdown_segments(&points, 5);
        assert_eq!(segments.len(), 2);

        let deepest = &segments[0];
        assert_eq!(deepest.peak_ts, 3);
        assert_eq!(deepest.trough_ts, 4);
        assert_eq!(deepest.recovery_ts, None);
        assert!((deepest.depth_pct - 30.0 / 110.0).abs() < 1e-12);
        assert_eq!(deepest.duration_bars, 2);

        let first = &segments[1];
        assert_eq!(first.recovery_ts, Some(2));
        assert!((first.depth_pct - 0.1).abs() < 1e-12);
        assert_eq!(first.duration_bars, 1);
    }

    #[test]
    fn top_n_truncates() {
        let points = curve(&[100.0, 90.0, 100.0, 95.0, 100.0, 50.0]);
        assert_eq!(drawdown_segments(&points, 1).len(), 1);
        assert!(drawdown_segments(&[], 3).is_empty());
    }

    #[test]
    fn segment_duration_matches_before_and_after_recovery() {
        let open = curve(&[100.0, 90.0]);
        let recovered = curve(&[100.0, 90.0, 100.0]);
        let open_seg = &drawdown_segments(&open, 1)[0];
        let recovered_seg = &drawdown_segments(&recovered, 1)[0];
        assert_eq!(open_seg.duration_bars, 1);
        assert_eq!(recovered_seg.duration_bars, 1);
        assert_eq!(max_drawdown_duration(&open), 1);
        assert_eq!(max_drawdown_duration(&recovered), 1);
    }

    #[test]
    fn duration_counts_bars_below_peak() {
        let points = curve(&[100.0, 99.0, 98.0, 101.0, 100.0]);
        assert_eq!(max_drawdown_duration(&points), 2);
    }
}
