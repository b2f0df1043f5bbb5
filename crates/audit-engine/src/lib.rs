//! Streaming audit-report analysis: load a YAML search library, detect
//! each source file's originating system, run every applicable search
//! over it in a single pass, and aggregate the results by OS family.
//!
//! Library only — the CLI front-end, workbook writer and progress
//! renderer that drive this crate live outside this workspace.

pub mod aggregator;
pub mod detector;
pub mod engine;
pub mod filter_eval;
pub mod loader;
pub mod scheduler;
pub mod streamer;

pub use aggregator::{aggregate, FamilyResults};
pub use detector::detect_system;
pub use engine::{analyze_system, CompiledSearch, SystemOutcome};
pub use filter_eval::system_matches;
pub use loader::{default_library_dir, load_library};
pub use scheduler::{run_all, CancelToken, NoopProgress, ProgressSink};
pub use streamer::ContentStreamer;
