use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ir::Direction;

/// Absolute tolerance used to absorb floating point layout error.
pub const GEOMETRY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan_distance(self, other: Point) -> f64 {
        (other.x - self.x).abs() + (other.y - self.y).abs()
    }

    /// Equal within [`GEOMETRY_EPSILON`] on both axes.
    pub fn approx_eq(self, other: Point) -> bool {
        (self.x - other.x).abs() <= GEOMETRY_EPSILON && (self.y - other.y).abs() <= GEOMETRY_EPSILON
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
}

impl LineSegment {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// A zero-length segment is both horizontal and vertical.
    pub fn is_horizontal(&self) -> bool {
        (self.end.y - self.start.y).abs() <= GEOMETRY_EPSILON
    }

    pub fn is_vertical(&self) -> bool {
        (self.end.x - self.start.x).abs() <= GEOMETRY_EPSILON
    }

    pub fn is_orthogonal(&self) -> bool {
        self.is_horizontal() || self.is_vertical()
    }

    pub fn is_degenerate(&self) -> bool {
        self.is_horizontal() && self.is_vertical()
    }

    pub fn manhattan_length(&self) -> f64 {
        self.start.manhattan_distance(self.end)
    }

    pub fn min_x(&self) -> f64 {
        self.start.x.min(self.end.x)
    }

    pub fn max_x(&self) -> f64 {
        self.start.x.max(self.end.x)
    }

    pub fn min_y(&self) -> f64 {
        self.start.y.min(self.end.y)
    }

    pub fn max_y(&self) -> f64 {
        self.start.y.max(self.end.y)
    }

    /// Whether `p` lies on this (orthogonal) segment, endpoints included.
    pub fn contains(&self, p: Point) -> bool {
        if self.is_horizontal() {
            (p.y - self.start.y).abs() <= GEOMETRY_EPSILON
                && p.x >= self.min_x() - GEOMETRY_EPSILON
                && p.x <= self.max_x() + GEOMETRY_EPSILON
        } else if self.is_vertical() {
            (p.x - self.start.x).abs() <= GEOMETRY_EPSILON
                && p.y >= self.min_y() - GEOMETRY_EPSILON
                && p.y <= self.max_y() + GEOMETRY_EPSILON
        } else {
            false
        }
    }

    /// Closest point on this orthogonal segment to `p`.
    pub fn closest_point(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(self.min_x(), self.max_x()),
            p.y.clamp(self.min_y(), self.max_y()),
        )
    }

    /// Length of the collinear overlap with another orthogonal segment.
    pub fn overlap_length(&self, other: &LineSegment) -> f64 {
        if self.is_degenerate() || other.is_degenerate() {
            return 0.0;
        }
        if self.is_horizontal() && other.is_horizontal() {
            if (self.start.y - other.start.y).abs() > GEOMETRY_EPSILON {
                return 0.0;
            }
            return (self.max_x().min(other.max_x()) - self.min_x().max(other.min_x())).max(0.0);
        }
        if self.is_vertical() && other.is_vertical() {
            if (self.start.x - other.start.x).abs() > GEOMETRY_EPSILON {
                return 0.0;
            }
            return (self.max_y().min(other.max_y()) - self.min_y().max(other.min_y())).max(0.0);
        }
        0.0
    }

    /// Point where a horizontal and a vertical segment cross, endpoints included.
    pub fn perpendicular_intersection(&self, other: &LineSegment) -> Option<Point> {
        let (h, v) = if self.is_horizontal() && !self.is_vertical() && other.is_vertical() {
            (self, other)
        } else if self.is_vertical() && !self.is_horizontal() && other.is_horizontal() {
            (other, self)
        } else {
            return None;
        };
        if other.is_degenerate() {
            return None;
        }
        let p = Point::new(v.start.x, h.start.y);
        (h.contains(p) && v.contains(p)).then_some(p)
    }

    /// Strictly inside the segment, away from both endpoints.
    pub fn contains_interior(&self, p: Point) -> bool {
        self.contains(p) && !p.approx_eq(self.start) && !p.approx_eq(self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Zero-area box at the origin, used for an empty subgraph.
    pub const fn empty() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Closed-box test: touching the border counts as a hit.
    pub fn intersects_segment(&self, segment: &LineSegment) -> bool {
        !(segment.max_x() < self.min_x
            || segment.min_x() > self.max_x
            || segment.max_y() < self.min_y
            || segment.min_y() > self.max_y)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(other.max_x < self.min_x
            || other.min_x > self.max_x
            || other.max_y < self.min_y
            || other.min_y > self.max_y)
    }
}

/// Placed cell: top-left corner plus rendered extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Position {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// Output of the coordinate stage. Superseded, never edited, on re-layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    positions: BTreeMap<String, Position>,
    layers: BTreeMap<String, usize>,
    bounds: BoundingBox,
    direction: Direction,
    crossings: usize,
}

impl LayoutResult {
    pub fn new(
        positions: BTreeMap<String, Position>,
        layers: BTreeMap<String, usize>,
        direction: Direction,
        crossings: usize,
    ) -> Self {
        let bounds = positions
            .values()
            .map(Position::bounds)
            .reduce(|acc, b| acc.union(&b))
            .unwrap_or_else(BoundingBox::empty);
        Self {
            positions,
            layers,
            bounds,
            direction,
            crossings,
        }
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, cell: &str) -> Option<&Position> {
        self.positions.get(cell)
    }

    pub fn layers(&self) -> &BTreeMap<String, usize> {
        &self.layers
    }

    pub fn layer(&self, cell: &str) -> Option<usize> {
        self.layers.get(cell).copied()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.values().copied().max().map_or(0, |max| max + 1)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Edge crossings between adjacent layers left after ordering.
    pub fn crossings(&self) -> usize {
        self.crossings
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
