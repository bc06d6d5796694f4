//! nvm-mem: persistent memory primitives over file-backed mappings.
//!
//! The crate provides the low-level layer a persistent data structure sits
//! on:
//!
//! - [`RegionMapper`] / [`Region`]: shared, pre-faulted file mappings with a
//!   cache-line-aligned usable area and a configurable teardown policy
//! - [`cache`]: flush, fence, prefetch and streaming stores, selected once per
//!   process for the running CPU
//! - [`naming`]: lock-free unique file names (`Data_0`, `Data_1`, ...)
//! - NUMA placement re-exported from `nvm-osal`
//!
//! Nothing here allocates objects inside a region or provides transactions;
//! any structure above the raw bytes belongs to the caller.
//!
//! # Example
//! ```rust,no_run
//! use nvm_mem::{MemoryConfig, NumaPlacement, RegionMapper};
//!
//! let placement = NumaPlacement::detect();
//! placement.bind_node(0)?;
//!
//! let mapper = RegionMapper::new(MemoryConfig::default())?;
//! let mut region = mapper.map_unique(64 << 20)?;
//! region.write_nt(0, &[0xAB; 4096])?;
//! region.fence();
//! region.flush(0, 4096)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod align;
pub mod cache;
pub mod config;
pub mod error;
pub mod naming;
pub mod region;

pub use cache::{CacheBackend, FlushKind, PrefetchLocality};
pub use config::{Config, MemoryConfig, TeardownPolicy};
pub use error::{ConfigError, MemError, MemResult};
pub use naming::{NameAllocator, allocate_file_index, allocate_file_name};
pub use region::{Region, RegionMapper};

pub use nvm_osal::{CpuMask, NumaNodeInfo, NumaPlacement, NumaTopology};

/// Granularity of flush, prefetch and region alignment.
pub const CACHE_LINE_SIZE: usize = 64;
