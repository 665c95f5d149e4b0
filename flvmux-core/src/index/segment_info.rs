//! Per-track media-segment bookkeeping, ordered by `original_begin_dts`
//! (spec.md §3 "MediaSegmentInfo(List)"). Used both for seek lookup and for
//! computing DTS corrections across discontinuities (spec.md §4.4).

/// A single sample's timestamps, as recorded in a segment boundary or a
/// sync point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleInfo {
    pub dts: i64,
    pub pts: i64,
    pub original_dts: i64,
    pub duration: u32,
}

/// A keyframe recorded within a segment (spec.md §3 "syncPoints[]").
pub type SyncPoint = SampleInfo;

/// One emitted `moof`+`mdat` pair's bookkeeping.
#[derive(Debug, Clone)]
pub struct MediaSegmentInfo {
    pub begin_dts: i64,
    pub end_dts: i64,
    pub begin_pts: i64,
    pub end_pts: i64,
    pub original_begin_dts: i64,
    pub original_end_dts: i64,
    pub first_sample: SampleInfo,
    pub last_sample: SampleInfo,
    pub sync_points: Vec<SyncPoint>,
}

/// Ordered list of [`MediaSegmentInfo`], sorted by `original_begin_dts`.
///
/// Insertion is a binary search in the general case, with a cached
/// "last append location" fast path so the common case of monotonically
/// increasing appends (normal forward playback) stays O(1).
#[derive(Debug, Default)]
pub struct MediaSegmentInfoList {
    segments: Vec<MediaSegmentInfo>,
    last_append_idx: Option<usize>,
}

impl MediaSegmentInfoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn as_slice(&self) -> &[MediaSegmentInfo] {
        &self.segments
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.last_append_idx = None;
    }

    pub fn last(&self) -> Option<&MediaSegmentInfo> {
        self.segments.last()
    }

    /// Insert a segment, keeping the list sorted by `original_begin_dts`.
    pub fn insert(&mut self, info: MediaSegmentInfo) {
        let fast_path = match self.last_append_idx {
            Some(idx) => self
                .segments
                .get(idx)
                .map(|prev| prev.original_begin_dts <= info.original_begin_dts)
                .unwrap_or(false),
            None => self
                .segments
                .last()
                .map(|prev| prev.original_begin_dts <= info.original_begin_dts)
                .unwrap_or(true),
        };

        if fast_path {
            self.segments.push(info);
            self.last_append_idx = Some(self.segments.len() - 1);
            return;
        }

        let pos = self
            .segments
            .partition_point(|s| s.original_begin_dts <= info.original_begin_dts);
        self.segments.insert(pos, info);
        self.last_append_idx = Some(pos);
    }

    /// Find the last segment whose range contains `original_dts`, or the
    /// one immediately preceding it.
    pub fn find_segment_before(&self, original_dts: i64) -> Option<&MediaSegmentInfo> {
        let pos = self
            .segments
            .partition_point(|s| s.original_begin_dts <= original_dts);
        if pos == 0 {
            None
        } else {
            Some(&self.segments[pos - 1])
        }
    }

    /// Binary-search lookup across every recorded sync point: returns the
    /// point with the largest `dts < dts_limit` (spec.md §8).
    pub fn last_sync_point_before(&self, dts_limit: i64) -> Option<SyncPoint> {
        let mut best: Option<SyncPoint> = None;
        for seg in &self.segments {
            if seg.begin_dts >= dts_limit {
                break;
            }
            let pos = seg.sync_points.partition_point(|p| p.dts < dts_limit);
            if pos > 0 {
                best = Some(seg.sync_points[pos - 1]);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(begin: i64, end: i64) -> MediaSegmentInfo {
        let s = SampleInfo {
            dts: begin,
            pts: begin,
            original_dts: begin,
            duration: 0,
        };
        MediaSegmentInfo {
            begin_dts: begin,
            end_dts: end,
            begin_pts: begin,
            end_pts: end,
            original_begin_dts: begin,
            original_end_dts: end,
            first_sample: s,
            last_sample: SampleInfo {
                dts: end,
                pts: end,
                original_dts: end,
                duration: 0,
            },
            sync_points: vec![s],
        }
    }

    #[test]
    fn monotonic_appends_use_fast_path() {
        let mut list = MediaSegmentInfoList::new();
        list.insert(seg(0, 1000));
        list.insert(seg(1000, 2000));
        list.insert(seg(2000, 3000));
        assert_eq!(list.len(), 3);
        assert_eq!(list.as_slice()[0].begin_dts, 0);
        assert_eq!(list.as_slice()[2].begin_dts, 2000);
    }

    #[test]
    fn out_of_order_insert_keeps_sorted_order() {
        let mut list = MediaSegmentInfoList::new();
        list.insert(seg(2000, 3000));
        list.insert(seg(0, 1000));
        list.insert(seg(1000, 2000));
        let begins: Vec<i64> = list.as_slice().iter().map(|s| s.begin_dts).collect();
        assert_eq!(begins, vec![0, 1000, 2000]);
    }

    #[test]
    fn last_sync_point_before_is_monotonic_non_decreasing() {
        let mut list = MediaSegmentInfoList::new();
        list.insert(seg(0, 1000));
        list.insert(seg(1000, 2000));
        list.insert(seg(2000, 3000));

        let a = list.last_sync_point_before(1500).unwrap();
        let b = list.last_sync_point_before(2500).unwrap();
        assert!(a.dts <= b.dts);
        assert_eq!(a.dts, 1000);
        assert_eq!(b.dts, 2000);
    }

    #[test]
    fn find_segment_before_locates_preceding_segment() {
        let mut list = MediaSegmentInfoList::new();
        list.insert(seg(0, 1000));
        list.insert(seg(1000, 2000));

        let found = list.find_segment_before(1500).unwrap();
        assert_eq!(found.begin_dts, 1000);
    }
}
