//! Sorted, partially-consumed frontier for the v1merge search.
//!
//! One ascending array of `(key, id, used)` replaces the candidate and
//! window heaps: the working set stays in a small contiguous region, and a
//! batch of admissions can be folded in with a single merge. The caller
//! keeps a cursor to the first unexpanded slot; both insertion paths return
//! the index they touched so the cursor can rewind when a closer,
//! unexpanded candidate appears behind it.

#[derive(Debug, Clone, Copy)]
pub(crate) struct FrontierItem {
    pub key: f32,
    pub id: u32,
    pub used: bool,
}

#[derive(Debug)]
pub(crate) struct SortedFrontier {
    items: Vec<FrontierItem>,
    capacity: usize,
}

impl SortedFrontier {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[FrontierItem] {
        &self.items
    }

    pub fn mark_used(&mut self, index: usize) -> u32 {
        let item = &mut self.items[index];
        debug_assert!(!item.used);
        item.used = true;
        item.id
    }

    /// Key of the current worst element, or +inf while the array has room.
    /// Stale within one expansion round; the search loop captures it once
    /// per expanded node, matching the admission rule of the traversal.
    pub fn top_key(&self) -> f32 {
        if self.items.len() >= self.capacity {
            self.items.last().map_or(f32::INFINITY, |it| it.key)
        } else {
            f32::INFINITY
        }
    }

    /// Seed the frontier with its first element.
    pub fn seed(&mut self, key: f32, id: u32) {
        debug_assert!(self.items.is_empty());
        self.items.push(FrontierItem {
            key,
            id,
            used: false,
        });
    }

    /// Insert one element, keeping ascending order and the capacity bound.
    ///
    /// Returns the insertion index, or `None` when the array is full and the
    /// key does not beat the current worst. Lookup is an exponential search
    /// from the tail: admitted keys overwhelmingly land near the end.
    pub fn insert(&mut self, key: f32, id: u32) -> Option<usize> {
        let len = self.items.len();
        if len >= self.capacity {
            if let Some(last) = self.items.last() {
                if key >= last.key {
                    return None;
                }
            }
        }

        // Narrow [lo, hi) from the back with doubling probes, then finish
        // with a binary search inside the window.
        let mut lo = 0usize;
        let mut hi = len;
        let mut step = 1usize;
        while step <= len {
            let probe = len - step;
            if self.items[probe].key <= key {
                lo = probe + 1;
                break;
            }
            hi = probe;
            step <<= 1;
        }
        let pos = lo + self.items[lo..hi].partition_point(|it| it.key <= key);

        self.items.insert(
            pos,
            FrontierItem {
                key,
                id,
                used: false,
            },
        );
        if self.items.len() > self.capacity {
            self.items.pop();
        }
        Some(pos)
    }

    /// Merge an ascending run of `(key, id)` admissions in one pass.
    ///
    /// Returns the index of the first element the run contributed, or the
    /// final length when nothing survived the capacity bound.
    pub fn merge_sorted(&mut self, run: &[(f32, u32)]) -> usize {
        let old = std::mem::take(&mut self.items);
        let mut merged = Vec::with_capacity((old.len() + run.len()).min(self.capacity));
        let mut first_inserted = usize::MAX;

        let (mut i, mut j) = (0usize, 0usize);
        while merged.len() < self.capacity && (i < old.len() || j < run.len()) {
            let take_run = match (old.get(i), run.get(j)) {
                (Some(existing), Some(&(key, _))) => key < existing.key,
                (None, Some(_)) => true,
                _ => false,
            };
            if take_run {
                if first_inserted == usize::MAX {
                    first_inserted = merged.len();
                }
                let (key, id) = run[j];
                j += 1;
                merged.push(FrontierItem {
                    key,
                    id,
                    used: false,
                });
            } else {
                merged.push(old[i]);
                i += 1;
            }
        }

        self.items = merged;
        first_inserted.min(self.items.len())
    }
}
