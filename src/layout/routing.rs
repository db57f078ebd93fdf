use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::ir::Netlist;

use super::error::ContractViolation;
use super::fanout::MultiFanoutHandler;
use super::net_geometry::NetGeometry;
use super::placement::Frame;
use super::types::{BoundingBox, GEOMETRY_EPSILON, LayoutResult, LineSegment, Point};

/// Why a net was drawn with a compromise instead of a clean wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DegradedReason {
    /// Shares a run with another net.
    TrackCollision,
    /// Crosses a cell it does not connect to.
    ObstacleOverlap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedRouting {
    pub net: String,
    pub reason: DegradedReason,
}

/// Per-run routing diagnostics. Degraded nets are still drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingReport {
    #[serde(default)]
    degraded: Vec<DegradedRouting>,
}

impl RoutingReport {
    pub fn degraded(&self) -> &[DegradedRouting] {
        &self.degraded
    }

    pub fn degraded_count(&self) -> usize {
        self.degraded.len()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn reason_for(&self, net: &str) -> Option<DegradedReason> {
        self.degraded
            .iter()
            .find(|entry| entry.net == net)
            .map(|entry| entry.reason)
    }
}

/// One geometry per net, in net order, plus the diagnostics of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedNets {
    pub geometries: Vec<NetGeometry>,
    pub report: RoutingReport,
}

/// Canonical-frame pin location and the cell it sits on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PinPoint {
    pub(crate) point: Point,
    pub(crate) cell: usize,
}

/// A wire to draw between two canonical points. `cells` are the cells the
/// endpoints sit on; the first and last segment may touch their border.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Connection {
    pub(crate) from: Point,
    pub(crate) to: Point,
    pub(crate) cells: [Option<usize>; 2],
}

impl Connection {
    pub(crate) fn between(from: PinPoint, to: PinPoint) -> Self {
        Self {
            from: from.point,
            to: to.point,
            cells: [Some(from.cell), Some(to.cell)],
        }
    }

    pub(crate) fn spur(from: Point, to: PinPoint) -> Self {
        Self {
            from,
            to: to.point,
            cells: [None, Some(to.cell)],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RoutedPath {
    pub(crate) points: Vec<Point>,
    pub(crate) degraded: Option<DegradedReason>,
}

/// Ordered lexicographically: anything touching a foreign cell is worse than
/// any amount of shared track.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
struct Penalty {
    obstacle_hits: usize,
    self_conflicts: usize,
    overlap: f64,
    bends: usize,
    length: f64,
}

impl Penalty {
    fn is_clean(&self) -> bool {
        self.obstacle_hits == 0 && self.self_conflicts == 0 && self.overlap <= GEOMETRY_EPSILON
    }

    fn reason(&self) -> DegradedReason {
        if self.obstacle_hits > 0 {
            DegradedReason::ObstacleOverlap
        } else {
            DegradedReason::TrackCollision
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Obstacle {
    bounds: BoundingBox,
    cell: usize,
}

/// Cell boxes sorted by their left edge, so a query only scans the layer
/// columns a segment can reach.
#[derive(Debug, Clone, Default)]
struct ObstacleIndex {
    obstacles: Vec<Obstacle>,
    max_width: f64,
}

impl ObstacleIndex {
    fn new(boxes: &[BoundingBox]) -> Self {
        let mut obstacles: Vec<Obstacle> = boxes
            .iter()
            .enumerate()
            .map(|(cell, bounds)| Obstacle {
                bounds: *bounds,
                cell,
            })
            .collect();
        obstacles.sort_by(|a, b| {
            a.bounds
                .min_x
                .total_cmp(&b.bounds.min_x)
                .then(a.cell.cmp(&b.cell))
        });
        let max_width = obstacles
            .iter()
            .map(|o| o.bounds.width())
            .fold(0.0, f64::max);
        Self {
            obstacles,
            max_width,
        }
    }

    fn reachable(&self, low_x: f64, high_x: f64) -> &[Obstacle] {
        let floor = low_x - self.max_width - GEOMETRY_EPSILON;
        let start = self.obstacles.partition_point(|o| o.bounds.min_x < floor);
        let end = self
            .obstacles
            .partition_point(|o| o.bounds.min_x <= high_x + GEOMETRY_EPSILON);
        &self.obstacles[start..end.max(start)]
    }

    /// Cells the segment touches. Cells in `endpoints` only count when the
    /// segment enters their interior.
    fn hits(&self, segment: &LineSegment, endpoints: &[Option<usize>; 2]) -> usize {
        self.reachable(segment.min_x(), segment.max_x())
            .iter()
            .filter(|o| {
                if endpoints.contains(&Some(o.cell)) {
                    enters_interior(&o.bounds, segment)
                } else {
                    o.bounds.intersects_segment(segment)
                }
            })
            .count()
    }
}

fn enters_interior(bounds: &BoundingBox, segment: &LineSegment) -> bool {
    segment.max_x() > bounds.min_x + GEOMETRY_EPSILON
        && segment.min_x() < bounds.max_x - GEOMETRY_EPSILON
        && segment.max_y() > bounds.min_y + GEOMETRY_EPSILON
        && segment.min_y() < bounds.max_y - GEOMETRY_EPSILON
}

#[derive(Debug, Clone, Copy)]
struct Run {
    low: f64,
    high: f64,
    net: usize,
}

/// Runs already claimed by routed nets, keyed by their fixed coordinate.
#[derive(Debug, Clone, Default)]
struct Occupancy {
    horizontal: BTreeMap<i64, Vec<Run>>,
    vertical: BTreeMap<i64, Vec<Run>>,
}

fn coordinate_key(value: f64) -> i64 {
    (value * 1_000.0).round() as i64
}

impl Occupancy {
    fn insert(&mut self, net: usize, segment: &LineSegment) {
        if segment.is_degenerate() {
            return;
        }
        if segment.is_horizontal() {
            self.horizontal
                .entry(coordinate_key(segment.start.y))
                .or_default()
                .push(Run {
                    low: segment.min_x(),
                    high: segment.max_x(),
                    net,
                });
        } else if segment.is_vertical() {
            self.vertical
                .entry(coordinate_key(segment.start.x))
                .or_default()
                .push(Run {
                    low: segment.min_y(),
                    high: segment.max_y(),
                    net,
                });
        }
    }

    /// Total collinear overlap with runs owned by other nets.
    fn overlap(&self, net: usize, segment: &LineSegment) -> f64 {
        if segment.is_degenerate() {
            return 0.0;
        }
        let (runs, low, high) = if segment.is_horizontal() {
            (
                self.horizontal.get(&coordinate_key(segment.start.y)),
                segment.min_x(),
                segment.max_x(),
            )
        } else if segment.is_vertical() {
            (
                self.vertical.get(&coordinate_key(segment.start.x)),
                segment.min_y(),
                segment.max_y(),
            )
        } else {
            return 0.0;
        };
        runs.map_or(0.0, |runs| {
            runs.iter()
                .filter(|run| run.net != net)
                .map(|run| (run.high.min(high) - run.low.max(low)).max(0.0))
                .sum()
        })
    }
}

/// Upper bound on tracks per channel, center included.
const MAX_CHANNEL_TRACKS: usize = 33;

/// Gap between two layer columns, or the margin outside the outer ones.
#[derive(Debug, Clone)]
struct Channel {
    low: f64,
    high: f64,
    /// Center first, then alternating outward.
    tracks: Vec<f64>,
}

impl Channel {
    fn new(low: f64, high: f64, spacing: f64) -> Self {
        let mid = (low + high) / 2.0;
        let mut tracks = vec![mid];
        let mut step = 1.0;
        while tracks.len() + 2 <= MAX_CHANNEL_TRACKS
            && mid + step * spacing < high - GEOMETRY_EPSILON
        {
            tracks.push(mid - step * spacing);
            tracks.push(mid + step * spacing);
            step += 1.0;
        }
        Self { low, high, tracks }
    }

    fn distance_to(&self, x: f64) -> f64 {
        if x < self.low {
            self.low - x
        } else if x > self.high {
            x - self.high
        } else {
            0.0
        }
    }
}

/// Two-terminal orthogonal router over a placed netlist.
///
/// Works in the canonical left-to-right frame: layers are columns, channels
/// are the vertical bands between them. Each connection tries progressively
/// more complex shapes (straight, L, Z through a channel track, detour through
/// an open row) and takes the first one that touches no foreign cell and
/// shares no run with another net. Nets are routed one after another and
/// claim their runs as they go.
pub struct OrthogonalRouter<'a> {
    netlist: &'a Netlist,
    frame: Frame,
    along_first: bool,
    channel_width: f64,
    wire_spacing: f64,
    cell_index: HashMap<&'a str, usize>,
    cell_boxes: Vec<BoundingBox>,
    cell_layers: Vec<usize>,
    extent: BoundingBox,
    obstacles: ObstacleIndex,
    channels: Vec<Channel>,
    occupancy: Occupancy,
}

impl<'a> OrthogonalRouter<'a> {
    pub fn new(
        netlist: &'a Netlist,
        layout: &LayoutResult,
        config: &LayoutConfig,
    ) -> Result<Self, ContractViolation> {
        let frame = Frame::new(layout.direction());
        let mut cell_index = HashMap::with_capacity(netlist.cells.len());
        let mut cell_boxes = Vec::with_capacity(netlist.cells.len());
        let mut cell_layers = Vec::with_capacity(netlist.cells.len());
        for (idx, cell) in netlist.cells.iter().enumerate() {
            let (Some(position), Some(layer)) = (layout.position(&cell.id), layout.layer(&cell.id))
            else {
                return Err(ContractViolation::UnplacedCell(cell.id.clone()));
            };
            let rect = frame.position_to_canonical(position);
            cell_index.insert(cell.id.as_str(), idx);
            cell_boxes.push(BoundingBox::new(
                rect.u,
                rect.v,
                rect.u + rect.du,
                rect.v + rect.dv,
            ));
            cell_layers.push(layer);
        }

        let extent = cell_boxes
            .iter()
            .fold(None, |acc: Option<BoundingBox>, b| {
                Some(acc.map_or(*b, |acc| acc.union(b)))
            })
            .unwrap_or_else(BoundingBox::empty);
        let channels = build_channels(&cell_boxes, &cell_layers, config);
        let along_first = if layout.direction().is_horizontal() {
            config.prefer_horizontal
        } else {
            !config.prefer_horizontal
        };

        Ok(Self {
            netlist,
            frame,
            along_first,
            channel_width: config.channel_width,
            wire_spacing: config.min_wire_spacing,
            cell_index,
            obstacles: ObstacleIndex::new(&cell_boxes),
            cell_boxes,
            cell_layers,
            extent,
            channels,
            occupancy: Occupancy::default(),
        })
    }

    /// Routes every net and maps the result back to the layout's direction.
    pub fn route_all(mut self) -> RoutedNets {
        let netlist = self.netlist;
        let pins: Vec<Vec<PinPoint>> = (0..netlist.nets.len())
            .map(|net| self.net_pins(net))
            .collect();

        let mut order: Vec<usize> = (0..netlist.nets.len()).collect();
        order.sort_by(|a, b| {
            let key = |net: usize| {
                pins[net]
                    .first()
                    .map_or((0, 0.0), |pin| (self.cell_layers[pin.cell], pin.point.y))
            };
            let (layer_a, cross_a) = key(*a);
            let (layer_b, cross_b) = key(*b);
            layer_a
                .cmp(&layer_b)
                .then(cross_a.total_cmp(&cross_b))
                .then(a.cmp(b))
        });

        let mut canonical: Vec<(Vec<LineSegment>, Vec<Point>)> =
            vec![(Vec::new(), Vec::new()); netlist.nets.len()];
        let mut degraded: Vec<(usize, DegradedReason)> = Vec::new();
        for net in order {
            let (segments, junctions, reason) = match pins[net].as_slice() {
                [] | [_] => (Vec::new(), Vec::new(), None),
                [driver, load] => {
                    let path = self.route_path(net, &Connection::between(*driver, *load), &|_: &[Point]| 0);
                    (path_segments(&path.points), Vec::new(), path.degraded)
                }
                [driver, loads @ ..] => {
                    let tree = MultiFanoutHandler::new(&self, net).route(*driver, loads);
                    (tree.segments, tree.junctions, tree.degraded)
                }
            };
            if let Some(reason) = reason {
                tracing::warn!(net = %netlist.nets[net].id, ?reason, "degraded routing");
                degraded.push((net, reason));
            }
            for segment in &segments {
                self.occupancy.insert(net, segment);
            }
            canonical[net] = (segments, junctions);
        }
        degraded.sort_by_key(|(net, _)| *net);

        let frame = self.frame;
        let mapped: Vec<(Vec<LineSegment>, Vec<Point>)> = canonical
            .into_iter()
            .map(|(segments, junctions)| {
                (
                    segments
                        .iter()
                        .map(|segment| frame.segment_from_canonical(segment))
                        .collect(),
                    junctions
                        .iter()
                        .map(|point| frame.from_canonical(*point))
                        .collect(),
                )
            })
            .collect();
        let segments: Vec<&[LineSegment]> = mapped.iter().map(|(s, _)| s.as_slice()).collect();
        let crossings = mark_crossings(&segments);

        let geometries = mapped
            .into_iter()
            .zip(crossings)
            .zip(&netlist.nets)
            .map(|(((segments, junctions), crossings), net)| {
                NetGeometry::new(net.id.clone(), segments, junctions, crossings)
            })
            .collect();

        tracing::debug!(
            nets = netlist.nets.len(),
            degraded = degraded.len(),
            "routed nets"
        );
        RoutedNets {
            geometries,
            report: RoutingReport {
                degraded: degraded
                    .into_iter()
                    .map(|(net, reason)| DegradedRouting {
                        net: netlist.nets[net].id.clone(),
                        reason,
                    })
                    .collect(),
            },
        }
    }

    fn net_pins(&self, net: usize) -> Vec<PinPoint> {
        self.netlist.nets[net]
            .terminals
            .iter()
            .filter_map(|terminal| {
                let cell = *self.cell_index.get(terminal.cell.as_str())?;
                let pin = self.netlist.cells[cell].pin(&terminal.pin)?;
                let rect = &self.cell_boxes[cell];
                Some(PinPoint {
                    point: self.canonical_pin(rect, pin.x, pin.y),
                    cell,
                })
            })
            .collect()
    }

    fn canonical_pin(&self, rect: &BoundingBox, x: f64, y: f64) -> Point {
        let corner = self.frame.from_canonical(Point::new(rect.min_x, rect.min_y));
        let far = self.frame.from_canonical(Point::new(rect.max_x, rect.max_y));
        let origin = Point::new(corner.x.min(far.x), corner.y.min(far.y));
        self.frame
            .to_canonical(Point::new(origin.x + x, origin.y + y))
    }

    /// Best path for `conn`, degraded when nothing clean exists. `conflicts`
    /// counts extra clashes the caller cares about (a spur touching its own
    /// tree).
    pub(crate) fn route_path(
        &self,
        net: usize,
        conn: &Connection,
        conflicts: &dyn Fn(&[Point]) -> usize,
    ) -> RoutedPath {
        let stages: [fn(&Self, &Connection) -> Vec<Vec<Point>>; 3] = [
            Self::simple_candidates,
            Self::z_candidates,
            Self::detour_candidates,
        ];
        let mut best: Option<(Penalty, Vec<Point>)> = None;
        for stage in stages {
            for candidate in stage(self, conn) {
                let points = simplify(&candidate);
                let penalty = self.penalty(net, conn, &points, conflicts(&points));
                if penalty.is_clean() {
                    return RoutedPath {
                        points,
                        degraded: None,
                    };
                }
                if best.as_ref().is_none_or(|(current, _)| penalty < *current) {
                    best = Some((penalty, points));
                }
            }
        }
        match best {
            Some((penalty, points)) => RoutedPath {
                points,
                degraded: Some(penalty.reason()),
            },
            None => RoutedPath {
                points: simplify(&[conn.from, Point::new(conn.to.x, conn.from.y), conn.to]),
                degraded: None,
            },
        }
    }

    /// First clean straight or L path, if any.
    pub(crate) fn clean_simple_path(
        &self,
        net: usize,
        conn: &Connection,
        conflicts: &dyn Fn(&[Point]) -> usize,
    ) -> Option<Vec<Point>> {
        self.simple_candidates(conn).into_iter().find_map(|candidate| {
            let points = simplify(&candidate);
            self.penalty(net, conn, &points, conflicts(&points))
                .is_clean()
                .then_some(points)
        })
    }

    /// Channel tracks strictly between `low` and `high`, ascending.
    pub(crate) fn tracks_between(&self, low: f64, high: f64) -> Vec<f64> {
        let mut tracks: Vec<f64> = self
            .channels
            .iter()
            .filter(|channel| channel.high > low && channel.low < high)
            .flat_map(|channel| channel.tracks.iter().copied())
            .filter(|t| *t > low + GEOMETRY_EPSILON && *t < high - GEOMETRY_EPSILON)
            .collect();
        tracks.sort_by(f64::total_cmp);
        tracks
    }

    fn penalty(&self, net: usize, conn: &Connection, points: &[Point], self_conflicts: usize) -> Penalty {
        let mut penalty = Penalty {
            obstacle_hits: 0,
            self_conflicts,
            overlap: 0.0,
            bends: points.len().saturating_sub(2),
            length: 0.0,
        };
        let last = points.len().saturating_sub(2);
        for (idx, pair) in points.windows(2).enumerate() {
            let segment = LineSegment::new(pair[0], pair[1]);
            if segment.is_degenerate() {
                continue;
            }
            let endpoints = [
                conn.cells[0].filter(|_| idx == 0),
                conn.cells[1].filter(|_| idx == last),
            ];
            penalty.obstacle_hits += self.obstacles.hits(&segment, &endpoints);
            penalty.overlap += self.occupancy.overlap(net, &segment);
            penalty.length += segment.manhattan_length();
        }
        penalty
    }

    fn simple_candidates(&self, conn: &Connection) -> Vec<Vec<Point>> {
        let (p, q) = (conn.from, conn.to);
        if (p.y - q.y).abs() <= GEOMETRY_EPSILON || (p.x - q.x).abs() <= GEOMETRY_EPSILON {
            return vec![vec![p, q]];
        }
        let along = vec![p, Point::new(q.x, p.y), q];
        let across = vec![p, Point::new(p.x, q.y), q];
        if self.along_first {
            vec![along, across]
        } else {
            vec![across, along]
        }
    }

    /// Vertical run on one channel track. Tracks between the endpoints come
    /// first, channels nearest the source first; then tracks just outside
    /// either endpoint, which bend back like a C.
    fn z_candidates(&self, conn: &Connection) -> Vec<Vec<Point>> {
        let (p, q) = (conn.from, conn.to);
        if (p.y - q.y).abs() <= GEOMETRY_EPSILON && (p.x - q.x).abs() > GEOMETRY_EPSILON {
            return Vec::new();
        }
        let z = |t: f64| vec![p, Point::new(t, p.y), Point::new(t, q.y), q];

        let (low, high) = (p.x.min(q.x), p.x.max(q.x));
        let mut inner: Vec<&Channel> = self
            .channels
            .iter()
            .filter(|channel| channel.high > low && channel.low < high)
            .collect();
        inner.sort_by(|a, b| a.distance_to(p.x).total_cmp(&b.distance_to(p.x)));
        let mut candidates: Vec<Vec<Point>> = inner
            .iter()
            .flat_map(|channel| channel.tracks.iter().copied())
            .filter(|t| *t > low + GEOMETRY_EPSILON && *t < high - GEOMETRY_EPSILON)
            .map(z)
            .collect();

        for x in [p.x, q.x] {
            candidates.extend(
                self.nearest_tracks(x)
                    .into_iter()
                    .filter(|t| *t < low - GEOMETRY_EPSILON || *t > high + GEOMETRY_EPSILON)
                    .map(z),
            );
        }
        candidates
    }

    /// Leaves the source along a track, crosses over on an open row, and
    /// comes back down another track next to the target.
    fn detour_candidates(&self, conn: &Connection) -> Vec<Vec<Point>> {
        let (p, q) = (conn.from, conn.to);
        let near_p = self.nearest_tracks(p.x);
        let near_q = self.nearest_tracks(q.x);
        let low = near_p
            .iter()
            .chain(&near_q)
            .copied()
            .fold(p.x.min(q.x), f64::min);
        let high = near_p
            .iter()
            .chain(&near_q)
            .copied()
            .fold(p.x.max(q.x), f64::max);

        let mut candidates = Vec::new();
        for r in self.detour_rows(p, q, low, high) {
            for t1 in &near_p {
                for t2 in &near_q {
                    candidates.push(vec![
                        p,
                        Point::new(*t1, p.y),
                        Point::new(*t1, r),
                        Point::new(*t2, r),
                        Point::new(*t2, q.y),
                        q,
                    ]);
                }
            }
        }
        candidates
    }

    /// Tracks of the channel closest to `x`.
    fn nearest_tracks(&self, x: f64) -> Vec<f64> {
        self.channels
            .iter()
            .min_by(|a, b| a.distance_to(x).total_cmp(&b.distance_to(x)))
            .map(|channel| channel.tracks.clone())
            .unwrap_or_default()
    }

    /// Rows just outside the cells spanning `[low, high]`, cheapest detour
    /// first, then the margins above and below everything.
    fn detour_rows(&self, p: Point, q: Point, low: f64, high: f64) -> Vec<f64> {
        const MAX_ROWS: usize = 16;
        let mut rows: Vec<f64> = self
            .obstacles
            .reachable(low, high)
            .iter()
            .filter(|o| o.bounds.max_x >= low && o.bounds.min_x <= high)
            .flat_map(|o| {
                [
                    o.bounds.min_y - self.wire_spacing,
                    o.bounds.max_y + self.wire_spacing,
                ]
            })
            .collect();
        let cost = |r: f64| (r - p.y).abs() + (r - q.y).abs();
        rows.sort_by(|a, b| cost(*a).total_cmp(&cost(*b)).then(a.total_cmp(b)));
        rows.dedup_by(|a, b| (*a - *b).abs() <= GEOMETRY_EPSILON);
        rows.truncate(MAX_ROWS);

        if !self.cell_boxes.is_empty() {
            let margin = self.channel_width / 2.0;
            for r in [self.extent.min_y - margin, self.extent.max_y + margin] {
                if !rows.iter().any(|row| (row - r).abs() <= GEOMETRY_EPSILON) {
                    rows.push(r);
                }
            }
        }
        rows
    }
}

fn build_channels(boxes: &[BoundingBox], layers: &[usize], config: &LayoutConfig) -> Vec<Channel> {
    let Some(layer_count) = layers.iter().max().map(|max| max + 1) else {
        return Vec::new();
    };
    let mut columns: Vec<Option<(f64, f64)>> = vec![None; layer_count];
    for (bounds, layer) in boxes.iter().zip(layers) {
        let column = columns[*layer].get_or_insert((bounds.min_x, bounds.max_x));
        column.0 = column.0.min(bounds.min_x);
        column.1 = column.1.max(bounds.max_x);
    }
    let columns: Vec<(f64, f64)> = columns.into_iter().flatten().collect();
    let (Some(first), Some(last)) = (columns.first(), columns.last()) else {
        return Vec::new();
    };

    let mut channels = Vec::with_capacity(columns.len() + 1);
    channels.push(Channel::new(
        first.0 - config.channel_width,
        first.0,
        config.min_wire_spacing,
    ));
    for pair in columns.windows(2) {
        channels.push(Channel::new(pair[0].1, pair[1].0, config.min_wire_spacing));
    }
    channels.push(Channel::new(
        last.1,
        last.1 + config.channel_width,
        config.min_wire_spacing,
    ));
    channels
}

/// Drops repeated points and merges collinear runs. A path that collapses
/// to a single point keeps it twice so it still forms a segment.
pub(crate) fn simplify(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_some_and(|last| last.approx_eq(*p)) {
            continue;
        }
        if let [.., a, b] = out.as_slice() {
            let vertical = (a.x - b.x).abs() <= GEOMETRY_EPSILON && (b.x - p.x).abs() <= GEOMETRY_EPSILON;
            let horizontal = (a.y - b.y).abs() <= GEOMETRY_EPSILON && (b.y - p.y).abs() <= GEOMETRY_EPSILON;
            if vertical || horizontal {
                out.pop();
            }
        }
        out.push(*p);
    }
    if let [only] = out.as_slice() {
        out.push(*only);
    }
    out
}

pub(crate) fn path_segments(points: &[Point]) -> Vec<LineSegment> {
    points
        .windows(2)
        .map(|pair| LineSegment::new(pair[0], pair[1]))
        .collect()
}

/// Points where a horizontal segment of one net crosses a vertical segment
/// of another, away from the endpoints of both. Each point is recorded on
/// the net owning the horizontal segment.
pub(crate) fn mark_crossings(nets: &[&[LineSegment]]) -> Vec<Vec<Point>> {
    let mut verticals: Vec<(f64, f64, f64, usize)> = nets
        .iter()
        .enumerate()
        .flat_map(|(net, segments)| {
            segments
                .iter()
                .filter(|s| s.is_vertical() && !s.is_horizontal())
                .map(move |s| (s.start.x, s.min_y(), s.max_y(), net))
        })
        .collect();
    verticals.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.3.cmp(&b.3)));

    nets.iter()
        .enumerate()
        .map(|(net, segments)| {
            let mut points: Vec<Point> = Vec::new();
            for h in segments.iter().filter(|s| s.is_horizontal() && !s.is_vertical()) {
                let (left, right) = (h.min_x() + GEOMETRY_EPSILON, h.max_x() - GEOMETRY_EPSILON);
                let start = verticals.partition_point(|v| v.0 <= left);
                let y = h.start.y;
                for (x, low, high, other) in verticals[start..].iter().take_while(|v| v.0 < right) {
                    if *other != net && y > low + GEOMETRY_EPSILON && y < high - GEOMETRY_EPSILON {
                        points.push(Point::new(*x, y));
                    }
                }
            }
            points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
            points.dedup_by(|a, b| a.approx_eq(*b));
            points
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Cell, Direction};
    use crate::layout::types::Position;

    fn gate(id: &str) -> Cell {
        Cell::new(id, 40.0, 30.0)
            .with_pin("a", 0.0, 15.0)
            .with_pin("y", 40.0, 15.0)
    }

    fn place(cells: &[(&str, f64, f64, usize)], direction: Direction) -> LayoutResult {
        let mut positions = BTreeMap::new();
        let mut layers = BTreeMap::new();
        for (id, x, y, layer) in cells {
            positions.insert(
                id.to_string(),
                Position {
                    x: *x,
                    y: *y,
                    width: 40.0,
                    height: 30.0,
                },
            );
            layers.insert(id.to_string(), *layer);
        }
        LayoutResult::new(positions, layers, direction, 0)
    }

    fn route(netlist: &Netlist, layout: &LayoutResult) -> RoutedNets {
        let config = LayoutConfig::default();
        OrthogonalRouter::new(netlist, layout, &config)
            .unwrap()
            .route_all()
    }

    fn assert_orthogonal(routed: &RoutedNets) {
        for geometry in &routed.geometries {
            geometry.validate().unwrap();
        }
    }

    #[test]
    fn aligned_pins_get_a_straight_wire() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A")).add_cell(gate("B"));
        netlist.add_net("n1", ("A", "y"), &[("B", "a")]);
        let layout = place(&[("A", 0.0, 0.0, 0), ("B", 160.0, 0.0, 1)], Direction::LeftRight);

        let routed = route(&netlist, &layout);
        let geometry = &routed.geometries[0];
        assert_eq!(geometry.segments().len(), 1);
        assert_eq!(geometry.bend_count(), 0);
        assert_eq!(geometry.segments()[0].start, Point::new(40.0, 15.0));
        assert_eq!(geometry.segments()[0].end, Point::new(160.0, 15.0));
        assert!(!routed.report.is_degraded());
    }

    #[test]
    fn offset_pins_get_one_bend() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A")).add_cell(gate("B"));
        netlist.add_net("n1", ("A", "y"), &[("B", "a")]);
        let layout = place(&[("A", 0.0, 0.0, 0), ("B", 160.0, 50.0, 1)], Direction::LeftRight);

        let routed = route(&netlist, &layout);
        let geometry = &routed.geometries[0];
        assert_eq!(geometry.bend_count(), 1);
        assert_eq!(geometry.segments()[0].end, Point::new(160.0, 15.0));
        assert_orthogonal(&routed);
    }

    #[test]
    fn blocked_l_shapes_fall_back_to_a_channel_track() {
        // X sits on the horizontal-first corner, Y on the vertical-first one.
        let mut netlist = Netlist::new();
        netlist
            .add_cell(gate("A"))
            .add_cell(gate("X"))
            .add_cell(gate("Y"))
            .add_cell(gate("B"));
        netlist.add_net("n1", ("A", "y"), &[("B", "a")]);
        let layout = place(
            &[
                ("A", 0.0, 0.0, 0),
                ("Y", 0.0, 85.0, 0),
                ("X", 160.0, 0.0, 1),
                ("B", 160.0, 85.0, 1),
            ],
            Direction::LeftRight,
        );

        let routed = route(&netlist, &layout);
        let geometry = &routed.geometries[0];
        assert_eq!(geometry.bend_count(), 2);
        let track = geometry.segments()[1];
        assert!(track.is_vertical());
        assert!(track.start.x > 40.0 && track.start.x < 160.0);
        assert!(!routed.report.is_degraded());
        assert_orthogonal(&routed);
    }

    #[test]
    fn wires_avoid_every_foreign_cell() {
        let mut netlist = Netlist::new();
        netlist
            .add_cell(gate("A"))
            .add_cell(gate("M"))
            .add_cell(gate("B"));
        netlist.add_net("n1", ("A", "y"), &[("B", "a")]);
        // M blocks the straight line from A to B.
        let layout = place(
            &[("A", 0.0, 0.0, 0), ("M", 160.0, 0.0, 1), ("B", 320.0, 0.0, 2)],
            Direction::LeftRight,
        );

        let routed = route(&netlist, &layout);
        let geometry = &routed.geometries[0];
        let m = layout.position("M").unwrap().bounds();
        assert!(geometry.segments().iter().all(|s| !m.intersects_segment(s)));
        assert!(!routed.report.is_degraded());
        assert_orthogonal(&routed);
    }

    #[test]
    fn parallel_nets_take_separate_tracks() {
        let mut netlist = Netlist::new();
        for id in ["A1", "A2", "B1", "B2"] {
            netlist.add_cell(gate(id));
        }
        netlist.add_net("n1", ("A1", "y"), &[("B1", "a")]);
        netlist.add_net("n2", ("A2", "y"), &[("B2", "a")]);
        let layout = place(
            &[
                ("A1", 0.0, 0.0, 0),
                ("A2", 0.0, 60.0, 0),
                ("B1", 160.0, 30.0, 1),
                ("B2", 160.0, 90.0, 1),
            ],
            Direction::LeftRight,
        );

        let routed = route(&netlist, &layout);
        let first = &routed.geometries[0];
        let second = &routed.geometries[1];
        for a in first.segments() {
            for b in second.segments() {
                assert!(a.overlap_length(b) <= GEOMETRY_EPSILON);
            }
        }
        assert!(!routed.report.is_degraded());
    }

    #[test]
    fn enclosed_pin_is_reported_degraded() {
        let mut netlist = Netlist::new();
        netlist
            .add_cell(gate("A"))
            .add_cell(Cell::new("B", 40.0, 30.0).with_pin("a", 20.0, 15.0));
        netlist.add_cell(Cell::new("Cage", 200.0, 200.0));
        netlist.add_net("n1", ("A", "y"), &[("B", "a")]);
        let mut positions = BTreeMap::new();
        positions.insert("A".to_string(), Position { x: 0.0, y: 0.0, width: 40.0, height: 30.0 });
        positions.insert("B".to_string(), Position { x: 240.0, y: 85.0, width: 40.0, height: 30.0 });
        positions.insert(
            "Cage".to_string(),
            Position { x: 160.0, y: 0.0, width: 200.0, height: 200.0 },
        );
        let layers = [("A", 0), ("B", 1), ("Cage", 1)]
            .into_iter()
            .map(|(id, layer)| (id.to_string(), layer))
            .collect();
        let layout = LayoutResult::new(positions, layers, Direction::LeftRight, 0);

        let routed = route(&netlist, &layout);
        assert_eq!(routed.report.degraded_count(), 1);
        assert_eq!(
            routed.report.reason_for("n1"),
            Some(DegradedReason::ObstacleOverlap)
        );
        assert_orthogonal(&routed);
    }

    #[test]
    fn top_bottom_routes_stay_orthogonal() {
        let mut netlist = Netlist::new();
        netlist
            .add_cell(Cell::new("A", 40.0, 30.0).with_pin("y", 20.0, 30.0))
            .add_cell(Cell::new("B", 40.0, 30.0).with_pin("a", 20.0, 0.0))
            .add_cell(Cell::new("C", 40.0, 30.0).with_pin("a", 20.0, 0.0));
        netlist.add_net("n1", ("A", "y"), &[("B", "a")]);
        netlist.add_net("n2", ("A", "y"), &[("C", "a")]);
        let layout = place(
            &[("A", 0.0, 0.0, 0), ("B", 0.0, 160.0, 1), ("C", 70.0, 160.0, 1)],
            Direction::TopBottom,
        );

        let routed = route(&netlist, &layout);
        assert_eq!(routed.geometries[0].segments().len(), 1);
        assert!(routed.geometries[0].segments()[0].is_vertical());
        assert_eq!(routed.geometries[1].segments()[0].start, Point::new(20.0, 30.0));
        assert_orthogonal(&routed);
    }

    #[test]
    fn single_terminal_net_is_empty() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A"));
        netlist.add_net("dangling", ("A", "y"), &[]);
        let layout = place(&[("A", 0.0, 0.0, 0)], Direction::LeftRight);
        let routed = route(&netlist, &layout);
        assert!(routed.geometries[0].is_empty());
    }

    #[test]
    fn crossings_are_marked_on_the_horizontal_net() {
        let horizontal = [LineSegment::new(Point::new(0.0, 10.0), Point::new(100.0, 10.0))];
        let vertical = [
            LineSegment::new(Point::new(50.0, 0.0), Point::new(50.0, 40.0)),
            // Touches the horizontal wire at its end: not a crossing.
            LineSegment::new(Point::new(100.0, 0.0), Point::new(100.0, 40.0)),
        ];
        let marks = mark_crossings(&[&horizontal[..], &vertical[..]]);
        assert_eq!(marks[0], vec![Point::new(50.0, 10.0)]);
        assert!(marks[1].is_empty());
    }

    #[test]
    fn simplify_merges_collinear_points() {
        let path = simplify(&[
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
        ]);
        assert_eq!(
            path,
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 5.0)]
        );
        let point = simplify(&[Point::new(5.0, 5.0), Point::new(5.0, 5.0)]);
        assert_eq!(point.len(), 2);
    }

    #[test]
    fn crowded_channel_falls_back_to_a_shared_track() {
        // Crossed nets through a channel with room for one track only.
        let mut netlist = Netlist::new();
        for i in 0..6 {
            netlist.add_cell(gate(&format!("A{i}")));
        }
        for i in 0..6 {
            netlist.add_cell(gate(&format!("B{i}")));
        }
        for i in 0..6 {
            let driver = format!("A{i}");
            let load = format!("B{}", (i + 3) % 6);
            netlist.add_net(format!("n{i}"), (driver.as_str(), "y"), &[(load.as_str(), "a")]);
        }
        let config = LayoutConfig {
            layer_spacing: 50.0,
            channel_width: 10.0,
            min_wire_spacing: 8.0,
            ..LayoutConfig::default()
        };
        let schematic = crate::layout::compute_schematic(&netlist, &config, None).unwrap();

        for geometry in &schematic.nets {
            geometry.validate().unwrap();
        }
        let report = &schematic.report;
        assert!(report.is_degraded());
        for entry in report.degraded() {
            assert_eq!(entry.reason, DegradedReason::TrackCollision, "{}", entry.net);
            let own = schematic.nets.iter().find(|g| g.net() == entry.net).unwrap();
            let shares_a_run = schematic
                .nets
                .iter()
                .filter(|other| other.net() != entry.net)
                .flat_map(|other| other.segments())
                .any(|b| own.segments().iter().any(|a| a.overlap_length(b) > GEOMETRY_EPSILON));
            assert!(shares_a_run, "{} is degraded but overlaps nothing", entry.net);
        }
    }

    #[test]
    fn channel_tracks_are_capped() {
        let channel = Channel::new(0.0, 100.0, 1e-4);
        assert_eq!(channel.tracks.len(), MAX_CHANNEL_TRACKS);
        assert_eq!(channel.tracks[0], 50.0);
        assert!(channel.tracks.iter().all(|t| *t > 0.0 && *t < 100.0));
        assert_eq!(Channel::new(40.0, 50.0, 8.0).tracks, vec![45.0]);
    }
}
