use thiserror::Error;

use super::types::Point;

/// Top-level error type for the layout pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Contract(#[from] ContractViolation),

    #[error(transparent)]
    Geometry(#[from] GeometryInvariantViolation),
}

/// The caller handed over a subgraph or configuration the pipeline cannot
/// lay out. Raised before any partial result exists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    #[error("net `{net}` has no terminals")]
    EmptyNet { net: String },

    #[error("net `{net}` references unknown cell `{cell}`")]
    UnknownCell { net: String, cell: String },

    #[error("cell `{cell}` has no offset for pin `{pin}` used by net `{net}`")]
    UnresolvedPin {
        net: String,
        cell: String,
        pin: String,
    },

    #[error("duplicate cell id `{0}`")]
    DuplicateCell(String),

    #[error("duplicate net id `{0}`")]
    DuplicateNet(String),

    #[error("cell `{cell}` has invalid extent {width} x {height}")]
    InvalidCellExtent { cell: String, width: f64, height: f64 },

    #[error("cell `{0}` has no position in the layout")]
    UnplacedCell(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// One non-orthogonal segment found by [`NetGeometry::validate`].
///
/// [`NetGeometry::validate`]: super::NetGeometry::validate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagonalSegment {
    pub index: usize,
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("net `{net}` has {} diagonal segment(s), first at index {} ({}, {}) -> ({}, {})",
    .segments.len(),
    .segments.first().map_or(0, |s| s.index),
    .segments.first().map_or(0.0, |s| s.start.x),
    .segments.first().map_or(0.0, |s| s.start.y),
    .segments.first().map_or(0.0, |s| s.end.x),
    .segments.first().map_or(0.0, |s| s.end.y))]
pub struct GeometryInvariantViolation {
    pub net: String,
    pub segments: Vec<DiagonalSegment>,
}

/// Convenience type alias for results using [`LayoutError`].
pub type Result<T> = std::result::Result<T, LayoutError>;
