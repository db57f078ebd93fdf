use std::collections::BTreeMap;

use crate::config::LayoutConfig;
use crate::ir::{Direction, Netlist};

use super::graph::LayerGraph;
use super::ordering::{LayerOrder, OrderHints};
use super::ranking::LayerAssignment;
use super::types::{GEOMETRY_EPSILON, LayoutResult, LineSegment, Point, Position};

/// Maps between the configured direction and the canonical left-to-right
/// frame the placement and routing stages work in. `u` runs along the layers,
/// `v` across them. Mirrored directions flip around the origin so a cell's
/// coordinates never depend on the size of the whole drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    direction: Direction,
}

impl Frame {
    pub(crate) fn new(direction: Direction) -> Self {
        Self { direction }
    }

    pub(crate) fn to_canonical(self, p: Point) -> Point {
        match self.direction {
            Direction::LeftRight => p,
            Direction::RightLeft => Point::new(-p.x, p.y),
            Direction::TopBottom => Point::new(p.y, p.x),
            Direction::BottomTop => Point::new(-p.y, p.x),
        }
    }

    pub(crate) fn from_canonical(self, p: Point) -> Point {
        match self.direction {
            Direction::LeftRight => p,
            Direction::RightLeft => Point::new(-p.x, p.y),
            Direction::TopBottom => Point::new(p.y, p.x),
            Direction::BottomTop => Point::new(p.y, -p.x),
        }
    }

    pub(crate) fn segment_from_canonical(self, segment: &LineSegment) -> LineSegment {
        LineSegment::new(
            self.from_canonical(segment.start),
            self.from_canonical(segment.end),
        )
    }

    /// Final-frame position of the canonical box `[u, u + du] x [v, v + dv]`.
    pub(crate) fn position_from_canonical(self, rect: CanonicalRect) -> Position {
        let a = self.from_canonical(Point::new(rect.u, rect.v));
        let b = self.from_canonical(Point::new(rect.u + rect.du, rect.v + rect.dv));
        // Extents are copied, not differenced, so they stay bit-exact.
        let (width, height) = self.extents(rect.du, rect.dv);
        Position {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width,
            height,
        }
    }

    pub(crate) fn position_to_canonical(self, position: &Position) -> CanonicalRect {
        let a = self.to_canonical(Point::new(position.x, position.y));
        let b = self.to_canonical(Point::new(
            position.x + position.width,
            position.y + position.height,
        ));
        let (du, dv) = self.extents(position.width, position.height);
        CanonicalRect {
            u: a.x.min(b.x),
            v: a.y.min(b.y),
            du,
            dv,
        }
    }

    /// Extent along the layer axis, then across it.
    fn extents(self, width: f64, height: f64) -> (f64, f64) {
        if self.direction.is_horizontal() {
            (width, height)
        } else {
            (height, width)
        }
    }

    /// Pin offset across the layer axis.
    fn cross_offset(self, x: f64, y: f64) -> f64 {
        if self.direction.is_horizontal() { y } else { x }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CanonicalRect {
    pub(crate) u: f64,
    pub(crate) v: f64,
    pub(crate) du: f64,
    pub(crate) dv: f64,
}

/// Pin-to-pin link used by the alignment pass.
#[derive(Debug, Clone, Copy)]
struct Link {
    neighbor: usize,
    own_offset: f64,
    neighbor_offset: f64,
}

/// Turns (layer, order) into positions.
///
/// Built once per run: it fixes the layer columns, resolves which layers a
/// previous layout still describes exactly, and hands the crossing minimizer
/// its seed before placing the final order.
pub struct CoordinateAssigner<'a> {
    config: &'a LayoutConfig,
    graph: &'a LayerGraph,
    assignment: &'a LayerAssignment,
    frame: Frame,
    main_extent: Vec<f64>,
    cross_extent: Vec<f64>,
    layer_u: Vec<f64>,
    links: Vec<Vec<Link>>,
    previous: Vec<Option<CanonicalRect>>,
    pinned: Vec<bool>,
}

impl<'a> CoordinateAssigner<'a> {
    pub fn new(
        netlist: &'a Netlist,
        graph: &'a LayerGraph,
        assignment: &'a LayerAssignment,
        config: &'a LayoutConfig,
        previous: Option<&LayoutResult>,
    ) -> Self {
        let frame = Frame::new(config.direction);
        let n = graph.cell_count();
        let mut main_extent = Vec::with_capacity(n);
        let mut cross_extent = Vec::with_capacity(n);
        for cell in &netlist.cells {
            let (main, cross) = frame.extents(cell.width, cell.height);
            main_extent.push(main);
            cross_extent.push(cross);
        }

        let layer_count = assignment.layer_count();
        let mut widest = vec![0.0f64; layer_count];
        for cell in 0..n {
            let layer = assignment.layer(cell);
            widest[layer] = widest[layer].max(main_extent[cell]);
        }
        let mut layer_u = Vec::with_capacity(layer_count);
        let mut u = 0.0f64;
        for width in &widest {
            layer_u.push(u);
            u += config.layer_spacing.max(width + config.channel_width);
        }

        let links = build_links(netlist, graph, frame);

        let mut assigner = Self {
            config,
            graph,
            assignment,
            frame,
            main_extent,
            cross_extent,
            layer_u,
            links,
            previous: vec![None; n],
            pinned: vec![false; layer_count],
        };
        if let Some(previous) = previous
            && previous.direction() == config.direction
        {
            assigner.adopt_previous(netlist, previous);
        }
        assigner
    }

    fn adopt_previous(&mut self, netlist: &Netlist, previous: &LayoutResult) {
        for (idx, cell) in netlist.cells.iter().enumerate() {
            if let Some(position) = previous.position(&cell.id) {
                self.previous[idx] = Some(self.frame.position_to_canonical(position));
            }
        }

        let mut previous_sizes: BTreeMap<usize, usize> = BTreeMap::new();
        for layer in previous.layers().values() {
            *previous_sizes.entry(*layer).or_default() += 1;
        }

        for (layer, bucket) in self.assignment.buckets().iter().enumerate() {
            if bucket.is_empty() || previous_sizes.get(&layer).copied() != Some(bucket.len()) {
                continue;
            }
            self.pinned[layer] = bucket.iter().all(|cell| {
                let id = self.graph.cell_id(*cell);
                let Some(rect) = self.previous[*cell] else {
                    return false;
                };
                previous.layer(id) == Some(layer)
                    && (rect.u - self.layer_u[layer]).abs() <= GEOMETRY_EPSILON
                    && (rect.du - self.main_extent[*cell]).abs() <= GEOMETRY_EPSILON
                    && (rect.dv - self.cross_extent[*cell]).abs() <= GEOMETRY_EPSILON
            });
        }
    }

    /// Seed for the crossing minimizer.
    pub fn order_hints(&self) -> OrderHints {
        OrderHints {
            previous_cross: self.previous.iter().map(|rect| rect.map(|r| r.v)).collect(),
            pinned_layers: self.pinned.clone(),
        }
    }

    pub fn pinned_layers(&self) -> &[bool] {
        &self.pinned
    }

    pub fn assign(&self, order: &LayerOrder, crossings: usize) -> LayoutResult {
        let n = self.graph.cell_count();
        let gap = self.config.alignment_gap();
        let mut cross = vec![0.0f64; n];

        for (layer, bucket) in order.layers().iter().enumerate() {
            if self.pinned[layer] {
                for cell in bucket {
                    cross[*cell] = self.previous[*cell].map_or(0.0, |rect| rect.v);
                }
                continue;
            }
            let mut v = 0.0f64;
            let desired: Vec<f64> = bucket
                .iter()
                .map(|cell| {
                    let stacked = v;
                    v += self.cross_extent[*cell] + self.config.cell_spacing;
                    self.previous[*cell].map_or(stacked, |rect| rect.v)
                })
                .collect();
            self.place_layer(bucket, &desired, gap, &mut cross);
        }

        for pass in 0..self.config.alignment_passes {
            let downward = pass % 2 == 0;
            let layers: Vec<usize> = if downward {
                (0..order.len()).collect()
            } else {
                (0..order.len()).rev().collect()
            };
            for layer in layers {
                if self.pinned[layer] {
                    continue;
                }
                let bucket = order.layer(layer);
                let desired: Vec<f64> = bucket
                    .iter()
                    .map(|cell| self.aligned_target(*cell, downward, &cross))
                    .collect();
                self.place_layer(bucket, &desired, gap, &mut cross);
            }
        }

        if !self.pinned.iter().any(|pinned| *pinned) {
            let min_v = cross.iter().copied().fold(f64::INFINITY, f64::min);
            if min_v.is_finite() {
                for v in cross.iter_mut() {
                    *v -= min_v;
                }
            }
        }

        let mut positions = BTreeMap::new();
        let mut layers = BTreeMap::new();
        for cell in 0..n {
            let layer = self.assignment.layer(cell);
            let rect = CanonicalRect {
                u: self.layer_u[layer],
                v: cross[cell],
                du: self.main_extent[cell],
                dv: self.cross_extent[cell],
            };
            let id = self.graph.cell_id(cell).to_string();
            positions.insert(id.clone(), self.frame.position_from_canonical(rect));
            layers.insert(id, layer);
        }

        LayoutResult::new(positions, layers, self.config.direction, crossings)
    }

    /// Average of the offsets that would line this cell's pins up with the
    /// pins of its neighbors on the side the sweep comes from (all neighbors
    /// when that side has none). Previously placed cells are pulled back toward
    /// their old spot with the same total weight.
    fn aligned_target(&self, cell: usize, downward: bool, cross: &[f64]) -> f64 {
        let layer = self.assignment.layer(cell);
        let facing = |link: &&Link| {
            let other = self.assignment.layer(link.neighbor);
            if downward { other < layer } else { other > layer }
        };
        let mut links: Vec<&Link> = self.links[cell].iter().filter(facing).collect();
        if links.is_empty() {
            links = self.links[cell].iter().collect();
        }

        let mut sum: f64 = links
            .iter()
            .map(|link| cross[link.neighbor] + link.neighbor_offset - link.own_offset)
            .sum();
        let mut weight = links.len() as f64;
        if let Some(rect) = self.previous[cell] {
            if links.is_empty() {
                return rect.v;
            }
            sum += rect.v * weight;
            weight *= 2.0;
        }
        if weight == 0.0 { cross[cell] } else { sum / weight }
    }

    /// Order-preserving placement closest to `desired` in the least-squares
    /// sense, keeping `gap` between consecutive cells (pool adjacent violators).
    fn place_layer(&self, bucket: &[usize], desired: &[f64], gap: f64, cross: &mut [f64]) {
        let mut offsets = Vec::with_capacity(bucket.len());
        let mut acc = 0.0f64;
        for cell in bucket {
            offsets.push(acc);
            acc += self.cross_extent[*cell] + gap;
        }

        // (sum, count) blocks of the shifted targets, kept non-decreasing.
        let mut blocks: Vec<(f64, usize)> = Vec::with_capacity(bucket.len());
        for (target, offset) in desired.iter().zip(&offsets) {
            blocks.push((target - offset, 1));
            while blocks.len() >= 2 {
                let (sum_b, count_b) = blocks[blocks.len() - 1];
                let (sum_a, count_a) = blocks[blocks.len() - 2];
                if sum_a / count_a as f64 <= sum_b / count_b as f64 {
                    break;
                }
                blocks.pop();
                let last = blocks.len() - 1;
                blocks[last] = (sum_a + sum_b, count_a + count_b);
            }
        }

        let mut idx = 0usize;
        for (sum, count) in blocks {
            let level = sum / count as f64;
            for _ in 0..count {
                cross[bucket[idx]] = level + offsets[idx];
                idx += 1;
            }
        }
    }
}

fn build_links(netlist: &Netlist, graph: &LayerGraph, frame: Frame) -> Vec<Vec<Link>> {
    let mut links = vec![Vec::new(); graph.cell_count()];
    for net in &netlist.nets {
        let Some(driver) = net.driver() else {
            continue;
        };
        let (Some(from), Some(driver_cell)) = (graph.index_of(&driver.cell), netlist.cell(&driver.cell))
        else {
            continue;
        };
        let Some(driver_pin) = driver_cell.pin(&driver.pin) else {
            continue;
        };
        let driver_offset = frame.cross_offset(driver_pin.x, driver_pin.y);
        for load in net.loads() {
            let (Some(to), Some(load_cell)) = (graph.index_of(&load.cell), netlist.cell(&load.cell))
            else {
                continue;
            };
            if to == from {
                continue;
            }
            let Some(load_pin) = load_cell.pin(&load.pin) else {
                continue;
            };
            let load_offset = frame.cross_offset(load_pin.x, load_pin.y);
            links[from].push(Link {
                neighbor: to,
                own_offset: driver_offset,
                neighbor_offset: load_offset,
            });
            links[to].push(Link {
                neighbor: from,
                own_offset: load_offset,
                neighbor_offset: driver_offset,
            });
        }
    }
    links
}
