//! # smallworld
//!
//! Navigable small-world graph index for approximate nearest-neighbor
//! search over an arbitrary, possibly non-metric distance space.
//!
//! The index maintains a proximity graph over opaque [`DataObject`]s and
//! answers k-nearest-neighbor queries by greedy graph traversal, without
//! scanning the dataset. Construction is incremental and parallel; the
//! finished graph can be saved to a text file and reloaded against the
//! same dataset.
//!
//! ```no_run
//! use smallworld::{DataObject, DenseVectorSpace, IndexParams, SmallWorldIndex};
//!
//! let space = DenseVectorSpace;
//! let data: Vec<DataObject> = (0..1000)
//!     .map(|i| DataObject::from_f32s(i, &[i as f32, (i * 7 % 13) as f32]))
//!     .collect();
//!
//! let mut index = SmallWorldIndex::new(&space, &data);
//! index.create_index(IndexParams::default())?;
//! index.set_query_time_params(&[("efSearch", "64")])?;
//!
//! let probe = DataObject::from_f32s(-1, &[42.0, 3.0]);
//! for hit in index.knn(&probe, 10)? {
//!     println!("{} at distance {}", hit.object_id, hit.distance);
//! }
//! # Ok::<(), smallworld::IndexError>(())
//! ```

/// Tuning constants and index/query parameters.
pub mod config;
/// Crate error type and `Result` alias.
pub mod error;
/// Navigable small-world graph: storage, construction, and traversal.
pub mod nsw;
/// Text serialization with dataset-consistency checks on load.
pub mod persistence;
/// KNN result accumulator and the (rejected) range query.
pub mod query;
/// Opaque data objects and the distance oracle.
pub mod space;

pub use config::{IndexParams, QueryParams, SearchAlgo};
pub use error::{IndexError, Result};
pub use nsw::SmallWorldIndex;
pub use query::{KnnQuery, Neighbor, RangeQuery};
pub use space::{DataObject, DenseVectorSpace, Space};
