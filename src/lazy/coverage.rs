//! Tracking of which byte ranges of the remote resource are already cached.

/// An inclusive `[start, end]` span of absolute byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "inverted byte range {start}-{end}");
        Self { start, end }
    }

    /// Number of bytes in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// The set of byte ranges already present in the local cache.
///
/// Ranges are kept sorted by start offset, non-overlapping and
/// non-adjacent: any insert that overlaps or touches existing ranges is
/// merged, so the set is always in minimal form. The set only ever grows.
///
/// Recording is split from querying: [`gaps`](Self::gaps) answers "what is
/// still missing from `[start, end]`" without mutating, and
/// [`insert`](Self::insert) records coverage once the bytes are actually on
/// disk. A failed download therefore never leaves phantom coverage behind.
#[derive(Debug, Default)]
pub struct CoverageSet {
    ranges: Vec<ByteRange>,
}

impl CoverageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The indices `[lo, hi)` of existing ranges that overlap or touch
    /// `[start, end]`.
    ///
    /// `lo` is the first range whose end reaches `start - 1`; `hi` is the
    /// first range whose start lies beyond `end + 1`. Both are found by
    /// binary search on the sorted range list.
    fn overlap_bounds(&self, start: u64, end: u64) -> (usize, usize) {
        let lo = self
            .ranges
            .partition_point(|r| r.end < start.saturating_sub(1));
        let hi = self
            .ranges
            .partition_point(|r| r.start <= end.saturating_add(1));
        (lo, hi)
    }

    /// The sub-ranges of `[start, end]` not yet covered, in ascending order.
    ///
    /// Returns an empty vector when the request lies entirely inside
    /// existing coverage.
    pub fn gaps(&self, start: u64, end: u64) -> Vec<ByteRange> {
        debug_assert!(start <= end);
        let (lo, hi) = self.overlap_bounds(start, end);

        let mut gaps = Vec::new();
        let mut cursor = start;
        for range in &self.ranges[lo..hi] {
            if cursor < range.start {
                gaps.push(ByteRange::new(cursor, range.start - 1));
            }
            cursor = cursor.max(range.end.saturating_add(1));
        }
        if cursor <= end {
            gaps.push(ByteRange::new(cursor, end));
        }
        gaps
    }

    /// Record `[start, end]` as covered, merging with any existing ranges
    /// it overlaps or touches.
    pub fn insert(&mut self, start: u64, end: u64) {
        debug_assert!(start <= end);
        let (lo, hi) = self.overlap_bounds(start, end);

        let merged = if lo < hi {
            ByteRange::new(
                start.min(self.ranges[lo].start),
                end.max(self.ranges[hi - 1].end),
            )
        } else {
            ByteRange::new(start, end)
        };
        self.ranges.splice(lo..hi, [merged]);
    }

    /// Whether every byte of `[start, end]` is covered.
    pub fn contains(&self, start: u64, end: u64) -> bool {
        self.gaps(start, end).is_empty()
    }

    /// Current ranges, sorted and minimal.
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }
}
