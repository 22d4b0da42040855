//! Opaque data objects and the distance oracle.
//!
//! The index never interprets object payloads; it only hands pairs of
//! objects to a [`Space`] and orders the returned distances (lower is
//! closer). A space may be non-metric. [`DenseVectorSpace`] is the bundled
//! concrete space: Euclidean distance over f32 payloads stored
//! little-endian in the object's byte region.

/// An indexed payload: an external identifier plus an opaque byte region.
///
/// The byte region is what a [`Space`] computes distances over, and what the
/// search loops prefetch ahead of distance evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    id: i64,
    bytes: Vec<u8>,
}

impl DataObject {
    pub fn new(id: i64, bytes: Vec<u8>) -> Self {
        Self { id, bytes }
    }

    /// Build an object whose payload is a little-endian f32 sequence.
    pub fn from_f32s(id: i64, values: &[f32]) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Self { id, bytes }
    }

    /// External identifier. Unique within a dataset.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The opaque payload.
    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode the payload as a little-endian f32 sequence.
    pub fn as_f32s(&self) -> Vec<f32> {
        self.bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Distance oracle over [`DataObject`] payloads. Lower is closer.
///
/// `Sync` is required because the index is built by parallel workers and
/// queried from many threads.
pub trait Space: Sync {
    /// The distance used for queries and (by default) for indexing.
    fn distance(&self, a: &DataObject, b: &DataObject) -> f32;

    /// A faster, possibly inadmissible stand-in used during indexing when
    /// the index is configured with `useProxyDist`. Defaults to the true
    /// distance.
    fn proxy_distance(&self, a: &DataObject, b: &DataObject) -> f32 {
        self.distance(a, b)
    }
}

/// Euclidean space over dense f32 payloads.
///
/// The proxy distance is squared L2: it skips the square root, and since it
/// is a monotone transform of the true distance it preserves neighbor order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseVectorSpace;

impl DenseVectorSpace {
    fn squared_l2(a: &DataObject, b: &DataObject) -> f32 {
        let mut sum = 0.0f32;
        for (ca, cb) in a.data().chunks_exact(4).zip(b.data().chunks_exact(4)) {
            let xa = f32::from_le_bytes([ca[0], ca[1], ca[2], ca[3]]);
            let xb = f32::from_le_bytes([cb[0], cb[1], cb[2], cb[3]]);
            let d = xa - xb;
            sum += d * d;
        }
        sum
    }
}

impl Space for DenseVectorSpace {
    fn distance(&self, a: &DataObject, b: &DataObject) -> f32 {
        Self::squared_l2(a, b).sqrt()
    }

    fn proxy_distance(&self, a: &DataObject, b: &DataObject) -> f32 {
        Self::squared_l2(a, b)
    }
}
