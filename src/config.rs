//! Tuning constants and index parameters.
//!
//! Compile-time defaults live here as documented constants; runtime values
//! arrive either as typed structs ([`IndexParams`], [`QueryParams`]) or as a
//! key/value bag via `from_pairs`, which rejects unknown keys.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};

/// Method name written into saved index files and returned by `str_desc`.
pub const METHOD_NAME: &str = "small_world_rand";

/// Default target out-degree of a freshly inserted node.
///
/// Also the number of candidate neighbors returned by the
/// construction-time traversal. Typical range: 5–50.
pub const DEFAULT_NN: u32 = 10;

/// Batch-size threshold at which the v1merge frontier switches from
/// per-item exponential-search inserts to a single merge with a sorted run.
///
/// Below the threshold, m individual inserts cost O(m·log n); above it one
/// O(n) merge is cheaper.
pub const MERGE_BUFFER_SWITCH_THRESHOLD: usize = 100;

/// Initial capacity of the v1merge scratch buffer, in multiples of NN.
pub const SCRATCH_CAPACITY_FACTOR: usize = 8;

/// Query-time traversal algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchAlgo {
    /// Two-heap best-first traversal.
    Old,
    /// Single sorted-array frontier with batched merge and prefetching.
    V1Merge,
}

impl SearchAlgo {
    fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "old" => Ok(SearchAlgo::Old),
            "v1merge" => Ok(SearchAlgo::V1Merge),
            other => Err(IndexError::Config(format!(
                "algoType must be one of: old, v1merge (got '{other}')"
            ))),
        }
    }
}

impl std::fmt::Display for SearchAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchAlgo::Old => f.write_str("old"),
            SearchAlgo::V1Merge => f.write_str("v1merge"),
        }
    }
}

/// Construction-time parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexParams {
    /// Target out-degree of a new node; also K for the indexing traversal.
    pub nn: u32,
    /// Beam width of the construction-time traversal. Must be >= `nn`.
    pub ef_construction: u32,
    /// Number of parallel indexing workers.
    pub index_thread_qty: u32,
    /// Use the space's proxy distance (faster, possibly inadmissible)
    /// during indexing.
    pub use_proxy_dist: bool,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            nn: DEFAULT_NN,
            ef_construction: DEFAULT_NN,
            index_thread_qty: default_thread_qty(),
            use_proxy_dist: false,
        }
    }
}

impl IndexParams {
    /// Parse from a key/value bag. Recognized keys: `NN`, `efConstruction`,
    /// `indexThreadQty`, `useProxyDist`. Unknown keys are an error; so are
    /// `NN == 0` and `efConstruction < NN`.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self> {
        let mut nn = DEFAULT_NN;
        let mut ef_construction: Option<u32> = None;
        let mut index_thread_qty = default_thread_qty();
        let mut use_proxy_dist = false;

        for &(key, value) in pairs {
            match key {
                "NN" => nn = parse_value(key, value)?,
                "efConstruction" => ef_construction = Some(parse_value(key, value)?),
                "indexThreadQty" => index_thread_qty = parse_value(key, value)?,
                "useProxyDist" => use_proxy_dist = parse_value(key, value)?,
                other => {
                    return Err(IndexError::Config(format!(
                        "unknown index-time parameter '{other}'"
                    )))
                }
            }
        }

        let params = Self {
            nn,
            ef_construction: ef_construction.unwrap_or(nn),
            index_thread_qty,
            use_proxy_dist,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the parameter invariants: `NN >= 1`, `efConstruction >= NN`.
    pub fn validate(&self) -> Result<()> {
        if self.nn == 0 {
            return Err(IndexError::Config("NN must be at least 1".into()));
        }
        if self.ef_construction < self.nn {
            return Err(IndexError::Config(format!(
                "efConstruction ({}) must be >= NN ({})",
                self.ef_construction, self.nn
            )));
        }
        Ok(())
    }
}

/// Query-time parameters. Reset to defaults for the index's NN whenever a
/// bag omits a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParams {
    /// Beam width of the query-time traversal. Must be >= 1.
    pub ef_search: u32,
    /// Which traversal implementation answers the query.
    pub algo: SearchAlgo,
}

impl QueryParams {
    /// Defaults for an index built with the given NN: `efSearch = NN`,
    /// algorithm `old`.
    pub fn defaults_for(nn: u32) -> Self {
        Self {
            ef_search: nn,
            algo: SearchAlgo::Old,
        }
    }

    /// Parse from a key/value bag. Recognized keys: `efSearch`, `algoType`.
    /// Unknown keys and `efSearch == 0` are errors.
    pub fn from_pairs(pairs: &[(&str, &str)], nn: u32) -> Result<Self> {
        let mut params = Self::defaults_for(nn);
        for &(key, value) in pairs {
            match key {
                "efSearch" => params.ef_search = parse_value(key, value)?,
                "algoType" => params.algo = SearchAlgo::parse(value)?,
                other => {
                    return Err(IndexError::Config(format!(
                        "unknown query-time parameter '{other}'"
                    )))
                }
            }
        }
        if params.ef_search == 0 {
            return Err(IndexError::Config("efSearch must be at least 1".into()));
        }
        Ok(params)
    }
}

/// One worker per hardware thread when the count is not given explicitly.
fn default_thread_qty() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        IndexError::Config(format!("cannot parse value '{value}' for parameter '{key}'"))
    })
}
