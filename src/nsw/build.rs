//! Incremental graph construction.
//!
//! Nodes are inserted one at a time: a greedy traversal of the live graph
//! discovers up to NN candidate neighbors for the new node, the node is
//! linked bidirectionally to each, and only then is it published in the
//! registry. A node is therefore never reachable with a half-built
//! adjacency list. Parallel construction stripes internal ids across
//! workers (`id % T`) so every worker keeps inserting into a graph
//! populated with ids near its own, which is what produces the
//! small-world mix of short- and long-range edges.

use crate::config::{IndexParams, QueryParams};
use crate::error::{IndexError, Result};
use crate::nsw::graph::SmallWorldIndex;
use crate::nsw::search::{Candidate, ResultEntry};
use crate::nsw::visited::VisitedSet;
use crate::space::{DataObject, Space};
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

impl<'a, S: Space> SmallWorldIndex<'a, S> {
    /// Build the graph over the bound dataset. Any previous graph is
    /// discarded. On success every object is registered; there is no
    /// partial-success mode.
    pub fn create_index(&mut self, params: IndexParams) -> Result<()> {
        params.validate()?;
        self.query_params = QueryParams::defaults_for(params.nn);
        self.params = params;
        self.reset_graph();

        tracing::info!(
            nn = self.params.nn,
            ef_construction = self.params.ef_construction,
            index_thread_qty = self.params.index_thread_qty,
            use_proxy_dist = self.params.use_proxy_dist,
            "building small-world index"
        );

        if self.data.is_empty() {
            return Ok(());
        }

        // The first node goes in synchronously so every worker finds a
        // non-empty registry, and it fixes the entry point for the
        // lifetime of the index.
        self.registry.insert(self.nodes[0].object_id, 0);
        self.entry_point = Some(0);

        let n = self.data.len();
        let workers = self.params.index_thread_qty.max(1) as usize;

        if workers == 1 {
            let mut visited = VisitedSet::new(n);
            let mut scratch = Vec::new();
            for id in 1..n {
                self.add(id as u32, &mut visited, &mut scratch)?;
            }
        } else {
            let this = &*self;
            let outcomes: Vec<Result<()>> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..workers)
                    .map(|worker| {
                        scope.spawn(move || -> Result<()> {
                            let mut visited = VisitedSet::new(n);
                            let mut scratch = Vec::new();
                            for id in (1..n).filter(|id| id % workers == worker) {
                                this.add(id as u32, &mut visited, &mut scratch)?;
                            }
                            Ok(())
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .map_err(|_| {
                                IndexError::Invariant("indexing worker panicked".into())
                            })
                            .and_then(|outcome| outcome)
                    })
                    .collect()
            });
            for outcome in outcomes {
                outcome?;
            }
        }

        let registered = self.registry.len();
        if registered != n {
            return Err(IndexError::Invariant(format!(
                "registry holds {registered} nodes after build, dataset has {n}"
            )));
        }
        tracing::info!(nodes = n, "index construction finished");
        Ok(())
    }

    /// Replace the query-time parameters from a key/value bag
    /// (`efSearch`, `algoType`). Omitted keys fall back to defaults for
    /// the index's NN.
    pub fn set_query_time_params(&mut self, pairs: &[(&str, &str)]) -> Result<()> {
        self.query_params = QueryParams::from_pairs(pairs, self.params.nn)?;
        tracing::debug!(
            ef_search = self.query_params.ef_search,
            algo = %self.query_params.algo,
            "query-time parameters updated"
        );
        Ok(())
    }

    /// Replace the query-time parameters with an already-built struct.
    pub fn set_query_params(&mut self, params: QueryParams) -> Result<()> {
        if params.ef_search == 0 {
            return Err(IndexError::Config("efSearch must be at least 1".into()));
        }
        self.query_params = params;
        Ok(())
    }

    /// Distance used while indexing: the proxy when configured, the true
    /// distance otherwise.
    #[inline]
    fn index_time_distance(&self, a: &DataObject, b: &DataObject) -> f32 {
        if self.params.use_proxy_dist {
            self.space.proxy_distance(a, b)
        } else {
            self.space.distance(a, b)
        }
    }

    /// Insert one node into the live graph: discover neighbors, link both
    /// directions, then publish. Callable concurrently for distinct ids
    /// once the first node is registered.
    pub(crate) fn add(
        &self,
        internal_id: u32,
        visited: &mut VisitedSet,
        scratch: &mut Vec<u32>,
    ) -> Result<()> {
        let node = &self.nodes[internal_id as usize];
        node.friends.lock().clear();

        if self.registry.is_empty() {
            return Err(IndexError::Invariant(
                "add() called before the seed node was registered".into(),
            ));
        }

        let neighbors =
            self.search_for_indexing(&self.data[internal_id as usize], visited, scratch)?;

        // Link both directions, one lock at a time. The new node is still
        // unpublished, so no traversal can hold either lock against us in
        // an order that matters.
        for &(_, friend) in &neighbors {
            self.nodes[friend as usize].friends.lock().push(internal_id);
            node.friends.lock().push(friend);
        }

        self.registry.insert(node.object_id, internal_id);
        Ok(())
    }

    /// Greedy traversal of the live graph collecting up to NN candidate
    /// neighbors for a probe, bounded by the `efConstruction` window.
    ///
    /// Friend lists are snapshotted into `scratch` under the owning node's
    /// lock and the lock is released before any distance computation.
    pub(crate) fn search_for_indexing(
        &self,
        probe: &DataObject,
        visited: &mut VisitedSet,
        scratch: &mut Vec<u32>,
    ) -> Result<Vec<(f32, u32)>> {
        let entry = self
            .entry_point
            .ok_or_else(|| IndexError::Invariant("entry point not set".into()))?;
        let ef = self.params.ef_construction as usize;
        let nn = self.params.nn as usize;

        visited.ensure_capacity(self.nodes.len());
        visited.clear();

        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut window: BinaryHeap<OrderedFloat<f32>> = BinaryHeap::with_capacity(ef + 1);
        let mut result: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(nn + 1);

        let d = self.index_time_distance(&self.data[entry as usize], probe);
        candidates.push(Candidate {
            neg_distance: OrderedFloat(-d),
            id: entry,
        });
        window.push(OrderedFloat(d));
        visited.insert(entry);
        result.push(ResultEntry {
            distance: OrderedFloat(d),
            id: entry,
        });

        while let Some(current) = candidates.pop() {
            let current_dist = -current.neg_distance.0;
            let bound = window.peek().map_or(f32::INFINITY, |w| w.0);
            if current_dist > bound {
                break;
            }

            // Bounded critical section: copy the friend list and release
            // the lock before computing any distance.
            scratch.clear();
            scratch.extend_from_slice(&self.nodes[current.id as usize].friends.lock());

            for &friend in scratch.iter() {
                if friend as usize >= self.nodes.len() {
                    return Err(IndexError::Invariant(format!(
                        "friend id {friend} out of range for {} nodes",
                        self.nodes.len()
                    )));
                }
                if visited.insert(friend) {
                    let d = self.index_time_distance(&self.data[friend as usize], probe);

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

                    let worst = result.peek().map_or(f32::INFINITY, |r| r.distance.0);
                    if result.len() < nn || d < worst {
                        result.push(ResultEntry {
                            distance: OrderedFloat(d),
                            id: friend,
                        });
                        if result.len() > nn {
                            result.pop();
                        }
                    }
                }
            }
        }

        Ok(result
            .into_sorted_vec()
            .into_iter()
            .map(|entry| (entry.distance.0, entry.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::DenseVectorSpace;

    fn line_dataset(n: usize) -> Vec<DataObject> {
        (0..n)
            .map(|i| DataObject::from_f32s(i as i64, &[i as f32]))
            .collect()
    }

    fn params(nn: u32, ef_construction: u32, threads: u32) -> IndexParams {
        IndexParams {
            nn,
            ef_construction,
            index_thread_qty: threads,
            use_proxy_dist: false,
        }
    }

    fn assert_undirected(index: &SmallWorldIndex<'_, DenseVectorSpace>, n: usize) {
        for u in 0..n as u32 {
            for v in index.friends(u) {
                assert!(
                    index.friends(v).contains(&u),
                    "edge {u}->{v} has no reverse edge"
                );
            }
        }
    }

    #[test]
    fn test_empty_dataset_is_noop() {
        let space = DenseVectorSpace;
        let data: Vec<DataObject> = Vec::new();
        let mut index = SmallWorldIndex::new(&space, &data);
        index.create_index(IndexParams::default()).unwrap();
        assert_eq!(index.node_count(), 0);
        assert_eq!(index.entry_point(), None);
    }

    #[test]
    fn test_single_node() {
        let space = DenseVectorSpace;
        let data = line_dataset(1);
        let mut index = SmallWorldIndex::new(&space, &data);
        index.create_index(params(10, 10, 1)).unwrap();
        assert_eq!(index.node_count(), 1);
        assert_eq!(index.entry_point(), Some(0));
        assert!(index.friends(0).is_empty());
    }

    #[test]
    fn test_two_nodes_single_edge() {
        let space = DenseVectorSpace;
        let data = line_dataset(2);
        let mut index = SmallWorldIndex::new(&space, &data);
        index.create_index(params(10, 10, 1)).unwrap();
        assert_eq!(index.node_count(), 2);
        assert_eq!(index.friends(0), vec![1]);
        assert_eq!(index.friends(1), vec![0]);
    }

    #[test]
    fn test_degree_one_build_completes_as_tree() {
        let space = DenseVectorSpace;
        let data = line_dataset(12);
        let mut index = SmallWorldIndex::new(&space, &data);
        index.create_index(params(1, 1, 1)).unwrap();
        assert_eq!(index.node_count(), 12);
        // Each insertion contributes exactly one undirected edge.
        let degree_sum: usize = (0..12).map(|id| index.friends(id).len()).sum();
        assert_eq!(degree_sum, 2 * 11);
        assert_undirected(&index, 12);
    }

    #[test]
    fn test_sequential_build_invariants() {
        let space = DenseVectorSpace;
        let data = line_dataset(40);
        let mut index = SmallWorldIndex::new(&space, &data);
        index.create_index(params(4, 8, 1)).unwrap();
        assert_eq!(index.node_count(), 40);
        assert_undirected(&index, 40);
        for id in 1..40u32 {
            assert!(!index.friends(id).is_empty(), "node {id} is isolated");
        }
    }

    #[test]
    fn test_parallel_build_invariants() {
        let space = DenseVectorSpace;
        let data = line_dataset(100);
        let mut index = SmallWorldIndex::new(&space, &data);
        index.create_index(params(8, 32, 4)).unwrap();
        assert_eq!(index.node_count(), 100);
        assert_undirected(&index, 100);
        // No friend list references an unknown id and none holds duplicates.
        for id in 0..100u32 {
            let friends = index.friends(id);
            let mut dedup = friends.clone();
            dedup.sort_unstable();
            dedup.dedup();
            assert_eq!(dedup.len(), friends.len(), "duplicate edge at node {id}");
            assert!(friends.iter().all(|&f| f < 100));
            assert!(!friends.contains(&id), "self-loop at node {id}");
        }
    }

    #[test]
    fn test_entry_point_is_first_insert_not_min_object_id() {
        let space = DenseVectorSpace;
        // Descending object ids: data[0] has the largest id.
        let data: Vec<DataObject> = (0..8)
            .map(|i| DataObject::from_f32s(100 - i as i64, &[i as f32]))
            .collect();
        let mut index = SmallWorldIndex::new(&space, &data);
        index.create_index(params(3, 5, 1)).unwrap();
        assert_eq!(index.entry_point(), Some(100));
    }

    #[test]
    fn test_proxy_distance_build_still_searchable() {
        let space = DenseVectorSpace;
        let data = line_dataset(20);
        let mut index = SmallWorldIndex::new(&space, &data);
        index
            .create_index(IndexParams {
                nn: 3,
                ef_construction: 6,
                index_thread_qty: 1,
                use_proxy_dist: true,
            })
            .unwrap();
        index.set_query_time_params(&[("efSearch", "20")]).unwrap();
        let probe = DataObject::from_f32s(-1, &[7.2]);
        let results = index.knn(&probe, 2).unwrap();
        let ids: Vec<i64> = results.iter().map(|n| n.object_id).collect();
        assert_eq!(ids, vec![7, 8]);
    }

    #[test]
    fn test_rebuild_discards_previous_graph() {
        let space = DenseVectorSpace;
        let data = line_dataset(10);
        let mut index = SmallWorldIndex::new(&space, &data);
        index.create_index(params(5, 10, 1)).unwrap();
        index.create_index(params(1, 1, 1)).unwrap();
        let degree_sum: usize = (0..10).map(|id| index.friends(id).len()).sum();
        assert_eq!(degree_sum, 2 * 9);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let space = DenseVectorSpace;
        let data = line_dataset(4);
        let mut index = SmallWorldIndex::new(&space, &data);
        let err = index.create_index(params(0, 5, 1)).unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
        let err = index.create_index(params(6, 5, 1)).unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }
}
