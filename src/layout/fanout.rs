use super::routing::{Connection, DegradedReason, OrthogonalRouter, PinPoint, path_segments};
use super::types::{GEOMETRY_EPSILON, LineSegment, Point};

/// Canonical-frame tree of one multi-terminal net.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FanoutRoute {
    pub(crate) segments: Vec<LineSegment>,
    pub(crate) junctions: Vec<Point>,
    pub(crate) degraded: Option<DegradedReason>,
}

#[derive(Debug, Clone, Default)]
struct FanoutTree {
    segments: Vec<LineSegment>,
}

impl FanoutTree {
    /// Number of wire ends meeting at `p`; a point inside a segment counts
    /// as two.
    fn degree(&self, p: Point) -> usize {
        self.segments
            .iter()
            .filter(|s| !s.is_degenerate())
            .map(|s| {
                if s.start.approx_eq(p) || s.end.approx_eq(p) {
                    1
                } else if s.contains(p) {
                    2
                } else {
                    0
                }
            })
            .sum()
    }

    fn contains(&self, p: Point) -> bool {
        self.segments.iter().any(|s| s.contains(p))
    }

    fn distance_to(&self, p: Point, root: Point) -> f64 {
        self.segments
            .iter()
            .map(|s| s.closest_point(p).manhattan_distance(p))
            .fold(root.manhattan_distance(p), f64::min)
    }

    fn split_at(&mut self, p: Point) {
        if let Some(idx) = self.segments.iter().position(|s| s.contains_interior(p)) {
            let segment = self.segments[idx];
            self.segments.splice(
                idx..=idx,
                [
                    LineSegment::new(segment.start, p),
                    LineSegment::new(p, segment.end),
                ],
            );
        }
    }

    fn attach(&mut self, at: Point, path: &[Point]) {
        self.split_at(at);
        self.segments.extend(
            path_segments(path)
                .into_iter()
                .filter(|segment| !segment.is_degenerate()),
        );
    }

    /// Places where a candidate spur would touch the tree anywhere other than
    /// its attachment point.
    fn conflicts(&self, path: &[Point], attachment: Point) -> usize {
        let mut conflicts = path
            .iter()
            .skip(1)
            .filter(|p| !p.approx_eq(attachment) && self.contains(**p))
            .count();
        for spur in path_segments(path).iter().filter(|s| !s.is_degenerate()) {
            for segment in &self.segments {
                if spur.overlap_length(segment) > GEOMETRY_EPSILON {
                    conflicts += 1;
                } else if let Some(hit) = spur.perpendicular_intersection(segment)
                    && !hit.approx_eq(attachment)
                    && !path.iter().skip(1).any(|p| p.approx_eq(hit))
                {
                    conflicts += 1;
                }
            }
        }
        conflicts
    }

    fn vertices(&self) -> Vec<Point> {
        let mut vertices: Vec<Point> = Vec::new();
        for segment in &self.segments {
            for p in [segment.start, segment.end] {
                if !vertices.iter().any(|v| v.approx_eq(p)) {
                    vertices.push(p);
                }
            }
        }
        vertices
    }

    fn junctions(&self) -> Vec<Point> {
        let mut vertices = self.vertices();
        vertices.retain(|v| self.degree(*v) >= 3);
        vertices
    }

    /// Free wire end closest to `target`, or `root` on an empty tree.
    fn nearest_end(&self, target: Point, root: Point) -> Point {
        self.vertices()
            .into_iter()
            .filter(|v| self.degree(*v) == 1)
            .min_by(|a, b| {
                a.manhattan_distance(target)
                    .total_cmp(&b.manhattan_distance(target))
            })
            .unwrap_or(root)
    }
}

/// Grows a rectilinear tree for a net with more than one load.
///
/// The driver is first wired to its nearest load with the two-terminal
/// router. Every further load, nearest to the tree first, gets a spur from
/// the closest attachment point that yields a clean straight or L wire.
/// Attachment points are segment projections, segment ends, and channel
/// tracks crossed by horizontal segments. A vertex never gets a fourth wire.
pub(crate) struct MultiFanoutHandler<'r, 'a> {
    router: &'r OrthogonalRouter<'a>,
    net: usize,
}

impl<'r, 'a> MultiFanoutHandler<'r, 'a> {
    pub(crate) fn new(router: &'r OrthogonalRouter<'a>, net: usize) -> Self {
        Self { router, net }
    }

    pub(crate) fn route(&self, driver: PinPoint, loads: &[PinPoint]) -> FanoutRoute {
        let root = driver.point;
        let mut tree = FanoutTree::default();
        let mut degraded: Option<DegradedReason> = None;
        let mut pending: Vec<usize> = (0..loads.len()).collect();

        if let Some(slot) = nearest(&pending, |idx| root.manhattan_distance(loads[idx].point)) {
            let load = loads[pending.remove(slot)];
            let path = self.router.route_path(
                self.net,
                &Connection::between(driver, load),
                &|_: &[Point]| 0,
            );
            degraded = degraded.or(path.degraded);
            tree.attach(root, &path.points);
        }

        while let Some(slot) = nearest(&pending, |idx| tree.distance_to(loads[idx].point, root)) {
            let load = loads[pending.remove(slot)];
            if tree.contains(load.point) {
                tree.split_at(load.point);
                continue;
            }

            let candidates = self.attachment_points(&tree, root, load.point);
            let allowed: Vec<Point> = candidates
                .iter()
                .copied()
                .filter(|a| tree.degree(*a) < 3)
                .collect();

            let spur = allowed.iter().find_map(|a| {
                let conflicts = |path: &[Point]| tree.conflicts(path, *a);
                self.router
                    .clean_simple_path(self.net, &Connection::spur(*a, load), &conflicts)
                    .map(|points| (*a, points))
            });
            match spur {
                Some((a, points)) => tree.attach(a, &points),
                None => {
                    let a = allowed
                        .first()
                        .copied()
                        .unwrap_or_else(|| tree.nearest_end(load.point, root));
                    let conflicts = |path: &[Point]| tree.conflicts(path, a);
                    let path =
                        self.router
                            .route_path(self.net, &Connection::spur(a, load), &conflicts);
                    degraded = degraded.or(path.degraded);
                    tree.attach(a, &path.points);
                }
            }
        }

        FanoutRoute {
            junctions: tree.junctions(),
            segments: tree.segments,
            degraded,
        }
    }

    /// Candidate departure points for a spur to `target`, nearest first.
    fn attachment_points(&self, tree: &FanoutTree, root: Point, target: Point) -> Vec<Point> {
        let mut points = Vec::new();
        if tree.segments.is_empty() {
            points.push(root);
        }
        for segment in &tree.segments {
            points.push(segment.closest_point(target));
            points.push(segment.start);
            points.push(segment.end);
            if segment.is_horizontal() && !segment.is_degenerate() {
                let y = segment.start.y;
                points.extend(
                    self.router
                        .tracks_between(segment.min_x(), segment.max_x())
                        .into_iter()
                        .map(|t| Point::new(t, y)),
                );
            }
        }
        points.sort_by(|a, b| {
            a.manhattan_distance(target)
                .total_cmp(&b.manhattan_distance(target))
        });
        let mut unique: Vec<Point> = Vec::with_capacity(points.len());
        for p in points {
            if !unique.iter().any(|u| u.approx_eq(p)) {
                unique.push(p);
            }
        }
        unique
    }
}

/// Slot in `pending` with the smallest distance; earliest on ties.
fn nearest(pending: &[usize], distance: impl Fn(usize) -> f64) -> Option<usize> {
    pending
        .iter()
        .enumerate()
        .map(|(slot, idx)| (slot, distance(*idx)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(slot, _)| slot)
}
