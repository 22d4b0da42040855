//! Query-time traversal: the two-heap `old` algorithm and the
//! sorted-array `v1merge` algorithm.
//!
//! Both walk the same graph with the same greedy policy — expand the
//! nearest unexpanded candidate until it falls outside the window of the
//! `efSearch` best distances seen. They differ only in how the frontier is
//! represented. Construction must be finished before queries start.

use crate::config::{SearchAlgo, MERGE_BUFFER_SWITCH_THRESHOLD, SCRATCH_CAPACITY_FACTOR};
use crate::error::{IndexError, Result};
use crate::nsw::frontier::SortedFrontier;
use crate::nsw::graph::SmallWorldIndex;
use crate::nsw::visited::VisitedSet;
use crate::query::{KnnQuery, Neighbor, RangeQuery};
use crate::space::{DataObject, Space};
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Frontier entry keyed by negated distance: `BinaryHeap` is a max-heap,
/// so the top is the nearest unexpanded node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub neg_distance: OrderedFloat<f32>,
    pub id: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance
            .cmp(&other.neg_distance)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Result entry keyed by distance: max-heap, the top is the current worst,
/// popped when the bound overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResultEntry {
    pub distance: OrderedFloat<f32>,
    pub id: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a, S: Space> SmallWorldIndex<'a, S> {
    /// Answer a k-nearest-neighbor query with the configured algorithm.
    pub fn search(&self, query: &mut KnnQuery<'_, S>) -> Result<()> {
        match self.query_params.algo {
            SearchAlgo::Old => self.search_old(query),
            SearchAlgo::V1Merge => self.search_v1_merge(query),
        }
    }

    /// Range queries are not provided by this index.
    pub fn search_range(&self, _query: &RangeQuery) -> Result<()> {
        Err(IndexError::Unsupported("range search is not supported"))
    }

    /// Convenience wrapper: run a KNN query for `probe` and return the
    /// results sorted by ascending distance.
    pub fn knn(&self, probe: &DataObject, k: usize) -> Result<Vec<Neighbor>> {
        let mut query = KnnQuery::new(self.space, probe, k);
        self.search(&mut query)?;
        Ok(query.into_results())
    }

    fn check_ef_search(&self) -> Result<usize> {
        let ef = self.query_params.ef_search as usize;
        if ef == 0 {
            return Err(IndexError::Config("efSearch must be at least 1".into()));
        }
        Ok(ef)
    }

    fn check_friend_id(&self, id: u32) -> Result<()> {
        if (id as usize) < self.nodes.len() {
            Ok(())
        } else {
            Err(IndexError::Invariant(format!(
                "friend id {id} out of range for {} nodes",
                self.nodes.len()
            )))
        }
    }

    /// Best-first traversal over a candidate min-heap and a bounded window
    /// of the `efSearch` best distances. Every evaluated object is offered
    /// to the accumulator.
    fn search_old(&self, query: &mut KnnQuery<'_, S>) -> Result<()> {
        if self.registry.is_empty() {
            return Ok(());
        }
        let ef = self.check_ef_search()?;
        let entry = self
            .entry_point
            .ok_or_else(|| IndexError::Invariant("entry point not set".into()))?;

        let mut visited = VisitedSet::new(self.nodes.len());
        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut window: BinaryHeap<OrderedFloat<f32>> = BinaryHeap::with_capacity(ef + 1);
        let mut scratch: Vec<u32> = Vec::new();

        let entry_obj = &self.data[entry as usize];
        let d = query.distance_to(entry_obj);
        // Offer the entry point before it enters the frontier; nothing else
        // ever hands it to the accumulator.
        query.check_and_add(d, entry_obj);
        candidates.push(Candidate {
            neg_distance: OrderedFloat(-d),
            id: entry,
        });
        window.push(OrderedFloat(d));
        visited.insert(entry);

        while let Some(current) = candidates.pop() {
            let current_dist = -current.neg_distance.0;
            let bound = window.peek().map_or(f32::INFINITY, |w| w.0);
            // Local minimum: the nearest unexpanded candidate is already
            // outside the window.
            if current_dist > bound {
                break;
            }

            scratch.clear();
            scratch.extend_from_slice(&self.nodes[current.id as usize].friends.lock());

            for &friend in &scratch {
                self.prefetch_node(friend);
            }
            for &friend in &scratch {
                self.prefetch_payload(friend);
            }

            for &friend in &scratch {
                self.check_friend_id(friend)?;
                if visited.insert(friend) {
                    let obj = &self.data[friend as usize];
                    let d = query.distance_to(obj);

                    let bound = window.peek().map_or(f32::INFINITY, |w| w.0);
                    if window.len() < ef || d < bound {
                        window.push(OrderedFloat(d));
                        if window.len() > ef {
                            window.pop();
                        }
                        candidates.push(Candidate {
                            neg_distance: OrderedFloat(-d),
                            id: friend,
                        });
                    }

                    query.check_and_add(d, obj);
                }
            }
        }
        Ok(())
    }

    /// Same greedy policy over a single sorted array with a consumption
    /// cursor. Admissions are batched per expansion, sorted, and folded in
    /// either one merge or per-item inserts depending on batch size; an
    /// insertion behind the cursor rewinds it.
    fn search_v1_merge(&self, query: &mut KnnQuery<'_, S>) -> Result<()> {
        if self.registry.is_empty() {
            return Ok(());
        }
        let ef = self.check_ef_search()?;
        let k = query.k();
        let entry = self
            .entry_point
            .ok_or_else(|| IndexError::Invariant("entry point not set".into()))?;

        let mut visited = VisitedSet::new(self.nodes.len());
        let mut frontier = SortedFrontier::with_capacity(ef.max(k));
        let mut admitted: Vec<(f32, u32)> =
            Vec::with_capacity(SCRATCH_CAPACITY_FACTOR * self.params.nn as usize);
        let mut scratch: Vec<u32> = Vec::new();

        let d = query.distance_to(&self.data[entry as usize]);
        frontier.seed(d, entry);
        visited.insert(entry);

        let mut cursor = 0usize;
        while cursor < frontier.len().min(ef) {
            let node_id = frontier.mark_used(cursor);
            cursor += 1;

            scratch.clear();
            scratch.extend_from_slice(&self.nodes[node_id as usize].friends.lock());

            // Two prefetch passes so header and payload fetches overlap the
            // distance computations below.
            for &friend in &scratch {
                self.prefetch_node(friend);
            }
            for &friend in &scratch {
                self.prefetch_payload(friend);
            }

            let top_key = frontier.top_key();
            admitted.clear();
            for &friend in &scratch {
                self.check_friend_id(friend)?;
                if visited.insert(friend) {
                    let d = query.distance_to(&self.data[friend as usize]);
                    if frontier.len() < ef || d < top_key {
                        admitted.push((d, friend));
                    }
                }
            }

            if !admitted.is_empty() {
                admitted.sort_unstable_by(|a, b| {
                    a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
                });

                if admitted.len() > MERGE_BUFFER_SWITCH_THRESHOLD {
                    let index = frontier.merge_sorted(&admitted);
                    if index < cursor {
                        cursor = index;
                    }
                } else {
                    for &(d, id) in &admitted {
                        if let Some(index) = frontier.insert(d, id) {
                            if index < cursor {
                                cursor = index;
                            }
                        }
                    }
                }
            }

            // Land on the first unexpanded slot (or run off the end).
            while cursor < frontier.len() && frontier.items()[cursor].used {
                cursor += 1;
            }
        }

        for item in frontier.items().iter().take(k) {
            query.check_and_add(item.key, &self.data[item.id as usize]);
        }
        Ok(())
    }
}
