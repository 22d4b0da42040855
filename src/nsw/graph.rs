//! Graph storage: nodes, the object-id registry, and the index type.
//!
//! Adjacency is id-based: a node's friend list holds internal ids, and the
//! slot table maps internal id → node. Internal ids equal positions in the
//! dataset slice and never change. Each friend list carries its own lock so
//! a reader can snapshot it without blocking anyone's distance computation;
//! the lock is never held across a `distance()` call.

use crate::config::{IndexParams, QueryParams, METHOD_NAME};
use crate::space::{DataObject, Space};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// One graph vertex. The internal id is the node's slot position; the
/// object id is denormalized here so persistence and the registry never
/// need to touch the dataset slice.
#[derive(Debug)]
pub(crate) struct Node {
    pub object_id: i64,
    pub friends: Mutex<Vec<u32>>,
}

impl Node {
    fn new(object_id: i64) -> Self {
        Self {
            object_id,
            friends: Mutex::new(Vec::new()),
        }
    }
}

/// Mapping `object id → internal id`, iterated in object-id order by
/// persistence. Guarded by one mutex; the critical sections are trivial.
#[derive(Debug, Default)]
pub(crate) struct NodeRegistry {
    map: Mutex<BTreeMap<i64, u32>>,
}

impl NodeRegistry {
    /// Register a node. Callers guarantee the object id is not present.
    pub fn insert(&self, object_id: i64, internal_id: u32) {
        self.map.lock().insert(object_id, internal_id);
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Snapshot of `(object id, internal id)` pairs in object-id order.
    pub fn entries(&self) -> Vec<(i64, u32)> {
        self.map.lock().iter().map(|(&oid, &iid)| (oid, iid)).collect()
    }

    pub fn clear(&self) {
        self.map.lock().clear();
    }
}

/// Navigable small-world graph index over a borrowed dataset.
///
/// Build with [`create_index`](Self::create_index) (or restore with
/// [`load_index`](Self::load_index)), then query from any number of
/// threads. Queries must not overlap construction.
pub struct SmallWorldIndex<'a, S: Space> {
    pub(crate) space: &'a S,
    pub(crate) data: &'a [DataObject],
    pub(crate) nodes: Vec<Node>,
    pub(crate) registry: NodeRegistry,
    pub(crate) entry_point: Option<u32>,
    pub(crate) params: IndexParams,
    pub(crate) query_params: QueryParams,
}

impl<'a, S: Space> SmallWorldIndex<'a, S> {
    /// Bind an index to a space and dataset. The graph is empty until
    /// `create_index` or `load_index` runs.
    pub fn new(space: &'a S, data: &'a [DataObject]) -> Self {
        let params = IndexParams::default();
        let query_params = QueryParams::defaults_for(params.nn);
        Self {
            space,
            data,
            nodes: data.iter().map(|obj| Node::new(obj.id())).collect(),
            registry: NodeRegistry::default(),
            entry_point: None,
            params,
            query_params,
        }
    }

    /// Method name, also written into saved index files.
    pub fn str_desc(&self) -> &'static str {
        METHOD_NAME
    }

    /// Number of registered (published) nodes.
    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Object id of the traversal entry point, if the graph is non-empty.
    pub fn entry_point(&self) -> Option<i64> {
        self.entry_point.map(|iid| self.nodes[iid as usize].object_id)
    }

    /// Snapshot of a node's friend list, taken under the node's lock.
    pub fn friends(&self, internal_id: u32) -> Vec<u32> {
        self.nodes[internal_id as usize].friends.lock().clone()
    }

    /// Construction-time parameters currently in effect.
    pub fn index_params(&self) -> &IndexParams {
        &self.params
    }

    /// Query-time parameters currently in effect.
    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    /// Drop all edges and registrations, keeping the dataset binding.
    pub(crate) fn reset_graph(&mut self) {
        for node in &self.nodes {
            node.friends.lock().clear();
        }
        self.registry.clear();
        self.entry_point = None;
    }

    /// Hint the CPU to pull an object's header toward L1 ahead of its
    /// distance computation.
    #[inline(always)]
    pub(crate) fn prefetch_node(&self, internal_id: u32) {
        let obj = &self.data[internal_id as usize];
        prefetch_read(obj as *const DataObject as *const u8);
    }

    /// Hint the CPU to pull the first payload bytes toward L1.
    #[inline(always)]
    pub(crate) fn prefetch_payload(&self, internal_id: u32) {
        prefetch_read(self.data[internal_id as usize].data().as_ptr());
    }
}

/// Portable software prefetch hint (L1 cache, read).
/// No-op on unsupported platforms.
#[inline(always)]
fn prefetch_read(ptr: *const u8) {
    #[cfg(target_arch = "aarch64")]
    unsafe {
        std::arch::asm!(
            "prfm pldl1keep, [{ptr}]",
            ptr = in(reg) ptr,
            options(nostack, preserves_flags)
        );
    }
    #[cfg(target_arch = "x86_64")]
    unsafe {
        std::arch::x86_64::_mm_prefetch(ptr as *const i8, std::arch::x86_64::_MM_HINT_T0);
    }
    #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
    let _ = ptr;
}
