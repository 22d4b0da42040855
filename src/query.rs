//! Query-side types: the top-k result accumulator and the (rejected)
//! range query.
//!
//! A [`KnnQuery`] owns the probe object reference and a bounded max-heap of
//! the best results seen so far. The search loops offer every evaluated
//! object to it; the accumulator keeps the k closest.

use crate::space::{DataObject, Space};
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// One answer: the matched object's external id and its distance to the
/// probe, sorted ascending in the returned result list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub object_id: i64,
    pub distance: f32,
}

#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    distance: OrderedFloat<f32>,
    object_id: i64,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then(self.object_id.cmp(&other.object_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Accumulator for a k-nearest-neighbor query.
///
/// Holds the probe and the space so the traversal can ask for
/// probe-to-object distances without knowing either.
pub struct KnnQuery<'a, S: Space> {
    space: &'a S,
    probe: &'a DataObject,
    k: usize,
    heap: BinaryHeap<HeapEntry>,
}

impl<'a, S: Space> KnnQuery<'a, S> {
    pub fn new(space: &'a S, probe: &'a DataObject, k: usize) -> Self {
        Self {
            space,
            probe,
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    /// Number of results requested.
    pub fn k(&self) -> usize {
        self.k
    }

    /// True distance from the probe to `obj`.
    pub fn distance_to(&self, obj: &DataObject) -> f32 {
        self.space.distance(obj, self.probe)
    }

    /// Offer a candidate. Kept iff fewer than k results are held or the
    /// candidate beats the current worst.
    pub fn check_and_add(&mut self, distance: f32, obj: &DataObject) {
        if self.heap.len() < self.k {
            self.heap.push(HeapEntry {
                distance: OrderedFloat(distance),
                object_id: obj.id(),
            });
        } else if let Some(worst) = self.heap.peek() {
            if distance < worst.distance.0 {
                self.heap.pop();
                self.heap.push(HeapEntry {
                    distance: OrderedFloat(distance),
                    object_id: obj.id(),
                });
            }
        }
    }

    /// Consume the accumulator, returning results sorted by ascending
    /// distance.
    pub fn into_results(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| Neighbor {
                object_id: e.object_id,
                distance: e.distance.0,
            })
            .collect()
    }
}

/// Radius query around a probe. The small-world index rejects these; the
/// type exists so callers get a typed error instead of a missing method.
#[derive(Debug, Clone, Copy)]
pub struct RangeQuery {
    pub radius: f32,
}
