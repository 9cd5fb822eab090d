//! txlat statistics reconstruction.
//!
//! Rebuilds per-interval summaries and aggregate histogram matrices from
//! the sparse rows of one closed collection, and memoizes the result.
//!
//! # Example
//!
//! ```no_run
//! use tl_report::ReconstructionCache;
//! use tl_config::ResultRange;
//!
//! let cache = ReconstructionCache::new(32, ResultRange::default());
//! let stats = cache.get_or_build("probes.db", None)?;
//! println!("{}", tl_report::render_text(&stats, None));
//! # Ok::<(), tl_report::ReportError>(())
//! ```

pub mod cache;
pub mod error;
pub mod histogram;
pub mod reconstruct;
pub mod render;
pub mod summary;

pub use cache::{CacheStats, ReconstructionCache, DEFAULT_CACHE_CAPACITY};
pub use error::{ReportError, Result};
pub use histogram::{FamilyHistograms, Matrix, Trimmed};
pub use reconstruct::{reconstruct, resolve_collection, ReconstructedStats};
pub use render::render_text;
pub use summary::{summarize, SeriesPoint, Summary, ValueScale};
