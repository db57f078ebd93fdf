use serde::{Deserialize, Serialize};

use super::error::{DiagonalSegment, GeometryInvariantViolation};
use super::types::{LineSegment, Point};

/// Routed wire of one net. Built once per routing pass and never edited in
/// place; re-routing produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct NetGeometry {
    net: String,
    segments: Vec<LineSegment>,
    junctions: Vec<Point>,
    crossings: Vec<Point>,
}

impl NetGeometry {
    pub fn new(
        net: impl Into<String>,
        segments: Vec<LineSegment>,
        junctions: Vec<Point>,
        crossings: Vec<Point>,
    ) -> Self {
        Self {
            net: net.into(),
            segments,
            junctions,
            crossings,
        }
    }

    /// Builds a geometry from a polyline, one segment per consecutive pair.
    pub fn from_path(net: impl Into<String>, points: &[Point]) -> Self {
        let segments = points
            .windows(2)
            .map(|pair| LineSegment::new(pair[0], pair[1]))
            .collect();
        Self::new(net, segments, Vec::new(), Vec::new())
    }

    pub fn net(&self) -> &str {
        &self.net
    }

    pub fn segments(&self) -> &[LineSegment] {
        &self.segments
    }

    pub fn junctions(&self) -> &[Point] {
        &self.junctions
    }

    pub fn crossings(&self) -> &[Point] {
        &self.crossings
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Same net and wiring with a new set of crossing markers.
    pub fn with_crossings(self, crossings: Vec<Point>) -> Self {
        Self { crossings, ..self }
    }

    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(LineSegment::manhattan_length).sum()
    }

    /// Counts horizontal/vertical transitions between consecutive segments.
    /// Zero-length segments are neither purely horizontal nor purely vertical,
    /// so they never register as a turn.
    pub fn bend_count(&self) -> usize {
        self.segments
            .windows(2)
            .filter(|pair| {
                let a = orientation(&pair[0]);
                let b = orientation(&pair[1]);
                matches!(
                    (a, b),
                    (Some(Axis::Horizontal), Some(Axis::Vertical))
                        | (Some(Axis::Vertical), Some(Axis::Horizontal))
                )
            })
            .count()
    }

    pub fn validate(&self) -> Result<(), GeometryInvariantViolation> {
        let segments: Vec<DiagonalSegment> = self
            .segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| !segment.is_orthogonal())
            .map(|(index, segment)| DiagonalSegment {
                index,
                start: segment.start,
                end: segment.end,
            })
            .collect();
        if segments.is_empty() {
            return Ok(());
        }
        Err(GeometryInvariantViolation {
            net: self.net.clone(),
            segments,
        })
    }

    pub fn to_record(&self) -> NetGeometryRecord {
        NetGeometryRecord {
            net: self.net.clone(),
            segments: self
                .segments
                .iter()
                .map(|s| [s.start.x, s.start.y, s.end.x, s.end.y])
                .collect(),
            junctions: self.junctions.iter().map(|p| [p.x, p.y]).collect(),
            crossings: self.crossings.iter().map(|p| [p.x, p.y]).collect(),
        }
    }

    pub fn from_record(record: &NetGeometryRecord) -> Self {
        Self {
            net: record.net.clone(),
            segments: record
                .segments
                .iter()
                .map(|[x1, y1, x2, y2]| LineSegment::new(Point::new(*x1, *y1), Point::new(*x2, *y2)))
                .collect(),
            junctions: record.junctions.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
            crossings: record.crossings.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
        }
    }
}

/// Flat, stable shape of a [`NetGeometry`] for session save/restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetGeometryRecord {
    pub net: String,
    /// `[x1, y1, x2, y2]` per segment.
    pub segments: Vec<[f64; 4]>,
    pub junctions: Vec<[f64; 2]>,
    pub crossings: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

fn orientation(segment: &LineSegment) -> Option<Axis> {
    match (segment.is_horizontal(), segment.is_vertical()) {
        (true, false) => Some(Axis::Horizontal),
        (false, true) => Some(Axis::Vertical),
        _ => None,
    }
}
