use std::cmp::Ordering;

use super::graph::LayerGraph;
use super::ranking::LayerAssignment;

/// Per-layer cell order ("crossing order"), cell indices into the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOrder {
    layers: Vec<Vec<usize>>,
}

impl LayerOrder {
    pub fn layers(&self) -> &[Vec<usize>] {
        &self.layers
    }

    pub fn layer(&self, layer: usize) -> &[usize] {
        &self.layers[layer]
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Index of every cell inside its own layer.
    pub fn positions(&self, cell_count: usize) -> Vec<usize> {
        let mut positions = vec![0usize; cell_count];
        for bucket in &self.layers {
            for (idx, cell) in bucket.iter().enumerate() {
                positions[*cell] = idx;
            }
        }
        positions
    }
}

/// Seed for the minimizer taken from a previous layout.
#[derive(Debug, Clone, Default)]
pub struct OrderHints {
    /// Previous cross-axis coordinate of each cell, if it was placed before.
    pub previous_cross: Vec<Option<f64>>,
    /// Layers whose order must not change.
    pub pinned_layers: Vec<bool>,
}

impl OrderHints {
    fn previous(&self, cell: usize) -> Option<f64> {
        self.previous_cross.get(cell).copied().flatten()
    }

    fn is_pinned(&self, layer: usize) -> bool {
        self.pinned_layers.get(layer).copied().unwrap_or(false)
    }
}

/// Barycenter crossing reduction with alternating sweeps.
///
/// Runs exactly `passes` sweeps (even passes go down from layer 1, odd passes
/// go up from the second-to-last layer) and returns the order with the fewest
/// crossings seen, the earliest one on ties.
pub fn minimize_crossings(
    graph: &LayerGraph,
    assignment: &LayerAssignment,
    passes: usize,
    hints: &OrderHints,
) -> LayerOrder {
    let mut layers = assignment.buckets();
    for bucket in layers.iter_mut() {
        bucket.sort_by(|a, b| initial_key_cmp(*a, *b, hints));
    }
    let mut order = LayerOrder { layers };
    if order.len() <= 1 {
        return order;
    }

    let (upper, lower) = adjacent_neighbors(graph, assignment);
    let mut best = order.clone();
    let mut best_crossings = count_crossings(graph, assignment, &order);
    let initial_crossings = best_crossings;

    for pass in 0..passes {
        if best_crossings == 0 {
            break;
        }
        let mut positions = order.positions(graph.cell_count());
        if pass % 2 == 0 {
            for layer in 1..order.len() {
                if !hints.is_pinned(layer) {
                    sort_by_barycenter(&mut order.layers[layer], &upper, &mut positions);
                }
            }
        } else {
            for layer in (0..order.len() - 1).rev() {
                if !hints.is_pinned(layer) {
                    sort_by_barycenter(&mut order.layers[layer], &lower, &mut positions);
                }
            }
        }
        let crossings = count_crossings(graph, assignment, &order);
        if crossings < best_crossings {
            best_crossings = crossings;
            best = order.clone();
        }
    }

    tracing::debug!(
        passes,
        initial_crossings,
        crossings = best_crossings,
        "minimized crossings"
    );
    best
}

fn initial_key_cmp(a: usize, b: usize, hints: &OrderHints) -> Ordering {
    match (hints.previous(a), hints.previous(b)) {
        (Some(pa), Some(pb)) => pa.total_cmp(&pb).then(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(&b),
    }
}

/// Neighbors one layer up and one layer down, in edge insertion order.
/// Edges spanning more than one layer do not pull on either end.
fn adjacent_neighbors(
    graph: &LayerGraph,
    assignment: &LayerAssignment,
) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let n = graph.cell_count();
    let mut upper = vec![Vec::new(); n];
    let mut lower = vec![Vec::new(); n];
    for edge in graph.edges() {
        let (a, b) = (edge.from, edge.to);
        let (la, lb) = (assignment.layer(a), assignment.layer(b));
        if la + 1 == lb {
            upper[b].push(a);
            lower[a].push(b);
        } else if lb + 1 == la {
            upper[a].push(b);
            lower[b].push(a);
        }
    }
    (upper, lower)
}

fn sort_by_barycenter(bucket: &mut [usize], neighbors: &[Vec<usize>], positions: &mut [usize]) {
    if bucket.len() <= 1 {
        return;
    }
    let mut keyed: Vec<(f64, usize, usize)> = bucket
        .iter()
        .map(|cell| {
            let current = positions[*cell];
            let list = &neighbors[*cell];
            let barycenter = if list.is_empty() {
                current as f64
            } else {
                list.iter().map(|n| positions[*n] as f64).sum::<f64>() / list.len() as f64
            };
            (barycenter, current, *cell)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    for (idx, (_, _, cell)) in keyed.into_iter().enumerate() {
        bucket[idx] = cell;
        positions[cell] = idx;
    }
}

/// Crossings between adjacent layers, counted with an accumulator tree over
/// the edges sorted by their upper endpoint.
pub fn count_crossings(graph: &LayerGraph, assignment: &LayerAssignment, order: &LayerOrder) -> usize {
    if order.len() <= 1 {
        return 0;
    }
    let positions = order.positions(graph.cell_count());
    let mut per_gap: Vec<Vec<(usize, usize)>> = vec![Vec::new(); order.len() - 1];
    for edge in graph.edges() {
        let (la, lb) = (assignment.layer(edge.from), assignment.layer(edge.to));
        let (top, bottom, gap) = if la + 1 == lb {
            (edge.from, edge.to, la)
        } else if lb + 1 == la {
            (edge.to, edge.from, lb)
        } else {
            continue;
        };
        per_gap[gap].push((positions[top], positions[bottom]));
    }

    let mut total = 0usize;
    for (gap, pairs) in per_gap.iter_mut().enumerate() {
        if pairs.len() < 2 {
            continue;
        }
        pairs.sort_unstable();
        let width = order.layer(gap + 1).len();
        let mut tree = vec![0usize; width + 1];
        for (seen, (_, bottom)) in pairs.iter().enumerate() {
            // Earlier edges ending strictly to the right of `bottom` cross this one.
            let mut not_greater = 0usize;
            let mut idx = bottom + 1;
            while idx > 0 {
                not_greater += tree[idx];
                idx &= idx - 1;
            }
            total += seen - not_greater;
            let mut idx = bottom + 1;
            while idx <= width {
                tree[idx] += 1;
                idx += idx & idx.wrapping_neg();
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Cell, Netlist};
    use crate::layout::ranking::assign_layers;

    fn gate(id: &str) -> Cell {
        Cell::new(id, 40.0, 30.0)
            .with_pin("a", 0.0, 15.0)
            .with_pin("y", 40.0, 15.0)
    }

    fn build(ids: &[&str], edges: &[(&str, &str)]) -> (LayerGraph, LayerAssignment) {
        let mut netlist = Netlist::new();
        for id in ids {
            netlist.add_cell(gate(id));
        }
        for (idx, (from, to)) in edges.iter().enumerate() {
            netlist.add_net(format!("n{idx}"), (*from, "y"), &[(*to, "a")]);
        }
        let mut graph = LayerGraph::from_netlist(&netlist).unwrap();
        let layers = assign_layers(&mut graph);
        (graph, layers)
    }

    fn ids(graph: &LayerGraph, bucket: &[usize]) -> Vec<String> {
        bucket.iter().map(|c| graph.cell_id(*c).to_string()).collect()
    }

    #[test]
    fn untangles_a_single_crossing() {
        // A1 -> B2 and A2 -> B1 cross in insertion order.
        let (graph, layers) = build(&["A1", "A2", "B1", "B2"], &[("A1", "B2"), ("A2", "B1")]);
        let initial = LayerOrder {
            layers: layers.buckets(),
        };
        assert_eq!(count_crossings(&graph, &layers, &initial), 1);

        let order = minimize_crossings(&graph, &layers, 4, &OrderHints::default());
        assert_eq!(count_crossings(&graph, &layers, &order), 0);
        assert_eq!(ids(&graph, order.layer(1)), vec!["B2", "B1"]);
    }

    #[test]
    fn zero_passes_keeps_insertion_order() {
        let (graph, layers) = build(&["A1", "A2", "B1", "B2"], &[("A1", "B2"), ("A2", "B1")]);
        let order = minimize_crossings(&graph, &layers, 0, &OrderHints::default());
        assert_eq!(ids(&graph, order.layer(0)), vec!["A1", "A2"]);
        assert_eq!(ids(&graph, order.layer(1)), vec!["B1", "B2"]);
    }

    #[test]
    fn singleton_layers_pass_through() {
        let (graph, layers) = build(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        let order = minimize_crossings(&graph, &layers, 8, &OrderHints::default());
        assert_eq!(order.len(), 3);
        assert!(order.layers().iter().all(|bucket| bucket.len() == 1));
        assert_eq!(count_crossings(&graph, &layers, &order), 0);
    }

    #[test]
    fn counts_crossings_of_complete_bipartite_pair() {
        // K(2,2) drawn in any order has exactly one crossing.
        let (graph, layers) = build(
            &["A1", "A2", "B1", "B2"],
            &[("A1", "B1"), ("A1", "B2"), ("A2", "B1"), ("A2", "B2")],
        );
        let order = minimize_crossings(&graph, &layers, 6, &OrderHints::default());
        assert_eq!(count_crossings(&graph, &layers, &order), 1);
    }

    #[test]
    fn previous_positions_seed_and_pin_layers() {
        let (graph, layers) = build(&["A1", "A2", "B1", "B2"], &[("A1", "B2"), ("A2", "B1")]);
        let hints = OrderHints {
            previous_cross: vec![Some(50.0), Some(0.0), Some(0.0), Some(50.0)],
            pinned_layers: vec![true, true],
        };
        let order = minimize_crossings(&graph, &layers, 4, &hints);
        assert_eq!(ids(&graph, order.layer(0)), vec!["A2", "A1"]);
        assert_eq!(ids(&graph, order.layer(1)), vec!["B1", "B2"]);
    }

    #[test]
    fn minimizing_is_deterministic() {
        let names = ["A", "B", "C", "D", "E", "F", "G"];
        let edges = [
            ("A", "D"),
            ("A", "F"),
            ("B", "E"),
            ("C", "D"),
            ("C", "G"),
            ("B", "G"),
        ];
        let (graph, layers) = build(&names, &edges);
        let first = minimize_crossings(&graph, &layers, 8, &OrderHints::default());
        let second = minimize_crossings(&graph, &layers, 8, &OrderHints::default());
        assert_eq!(first, second);
    }
}
