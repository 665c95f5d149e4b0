//! Ordered list of video keyframes, sorted by `original_dts` (spec.md §3).

/// A single keyframe entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdrSampleInfo {
    pub original_dts: i64,
    pub file_position: Option<u64>,
}

/// Ordered sequence of video keyframe entries, appended in batches.
///
/// Preserves the sorted-by-`original_dts` invariant while allowing seeks or
/// replays to jump backward without an explicit clear from upstream: if a
/// new batch's first entry precedes the list's current tail, the whole list
/// is reset first (spec.md §4.5, §9 "Reset-on-backward-jump").
#[derive(Debug, Clone, Default)]
pub struct IdrSampleList {
    entries: Vec<IdrSampleInfo>,
}

impl IdrSampleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn as_slice(&self) -> &[IdrSampleInfo] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append a batch of keyframe entries, already sorted by `original_dts`.
    /// A no-op on an empty batch.
    pub fn append_array(&mut self, batch: &[IdrSampleInfo]) {
        let Some(first) = batch.first() else {
            return;
        };
        if let Some(tail) = self.entries.last() {
            if first.original_dts < tail.original_dts {
                self.entries.clear();
            }
        }
        self.entries.extend_from_slice(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dts: i64) -> IdrSampleInfo {
        IdrSampleInfo {
            original_dts: dts,
            file_position: None,
        }
    }

    #[test]
    fn append_array_is_idempotent_on_empty_batch() {
        let mut list = IdrSampleList::new();
        list.append_array(&[entry(0), entry(1000)]);
        let before = list.as_slice().to_vec();
        list.append_array(&[]);
        assert_eq!(list.as_slice(), before.as_slice());
    }

    #[test]
    fn resets_on_backward_jump() {
        let mut list = IdrSampleList::new();
        list.append_array(&[entry(0), entry(2000), entry(4000)]);
        assert_eq!(list.len(), 3);

        // A seek-to-start replay arrives with a smaller originalDts than the tail.
        list.append_array(&[entry(0), entry(1000)]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.as_slice()[0].original_dts, 0);
        assert_eq!(list.as_slice()[1].original_dts, 1000);
    }

    #[test]
    fn keeps_appending_when_monotonic() {
        let mut list = IdrSampleList::new();
        list.append_array(&[entry(0), entry(2000)]);
        list.append_array(&[entry(4000), entry(6000)]);
        assert_eq!(list.len(), 4);
    }
}
