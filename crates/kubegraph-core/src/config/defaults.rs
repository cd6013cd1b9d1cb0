//! Default values for kubegraph configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Engine Defaults
// ============================================================================

/// Capacity of the bounded intake queue shared by all event sources.
pub const DEFAULT_INTAKE_CAPACITY: usize = 1024;

/// Maximum queued messages applied before a snapshot is published.
pub const DEFAULT_MAX_BATCH: usize = 256;

/// How long an edge may wait for its missing endpoint (seconds).
pub const DEFAULT_PENDING_HORIZON_SECS: u64 = 300;

/// Interval between pending-edge expiry sweeps (seconds).
pub const DEFAULT_EXPIRY_INTERVAL_SECS: u64 = 30;

/// Buffered deltas per subscriber before it starts lagging.
pub const DEFAULT_DELTA_CAPACITY: usize = 256;

// ============================================================================
// Layout Defaults
// ============================================================================

/// Default layout strategy.
pub const DEFAULT_LAYOUT_STRATEGY: &str = "force";

/// Force-directed iterations per component.
pub const DEFAULT_LAYOUT_ITERATIONS: usize = 300;

/// Ideal distance between connected nodes, and the gap between packed components.
pub const DEFAULT_LAYOUT_SPACING: f64 = 180.0;

/// Components larger than this are placed with the layered strategy.
pub const DEFAULT_FORCE_NODE_LIMIT: usize = 800;

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = ".kubegraph";

/// Default snapshots subdirectory.
pub const DEFAULT_SNAPSHOTS_DIR: &str = "snapshots";

/// Snapshots kept on disk before the oldest are pruned.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 100;

// ============================================================================
// Export Defaults
// ============================================================================

/// Default export format.
pub const DEFAULT_EXPORT_FORMAT: &str = "svg";

/// Views larger than this are truncated and flagged `NODE_LIMIT`.
pub const DEFAULT_MAX_NODES: usize = 5000;
