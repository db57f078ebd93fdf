use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::graph::LayerGraph;

/// Result of layer assignment: one 0-based layer per cell index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerAssignment {
    layers: Vec<usize>,
}

impl LayerAssignment {
    pub fn layer(&self, cell: usize) -> usize {
        self.layers[cell]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.iter().copied().max().map_or(0, |max| max + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Cells grouped per layer in cell index order.
    pub fn buckets(&self) -> Vec<Vec<usize>> {
        let mut buckets = vec![Vec::new(); self.layer_count()];
        for (cell, layer) in self.layers.iter().enumerate() {
            buckets[*layer].push(cell);
        }
        buckets
    }
}

/// Breaks cycles and assigns longest-path layers.
///
/// Feedback edges are only flagged on the arena; the netlist is untouched.
pub fn assign_layers(graph: &mut LayerGraph) -> LayerAssignment {
    break_cycles(graph);
    let layers = longest_path_layers(graph);
    tracing::debug!(
        cells = graph.cell_count(),
        edges = graph.edges().len(),
        reversed = graph.reversed_edges().count(),
        layers = layers.layer_count(),
        "assigned layers"
    );
    layers
}

/// Chooses the feedback edge set.
///
/// In-cycle edges entering a sequential cell are dropped first, then any cycle
/// left over loses the back edges of an insertion-ordered DFS. The remaining
/// DAG is ordered topologically, and every edge that points backward in that
/// order gets reversed. Reversing against a linear order cannot create a new
/// cycle.
pub(crate) fn break_cycles(graph: &mut LayerGraph) {
    let n = graph.cell_count();
    if n == 0 {
        return;
    }
    for edge in graph.edges_mut() {
        edge.reversed = false;
    }

    let component = strongly_connected_components(n, graph);
    let mut dropped: Vec<bool> = graph
        .edges()
        .iter()
        .map(|edge| component[edge.from] == component[edge.to] && graph.is_sequential(edge.to))
        .collect();

    for edge_idx in dfs_back_edges(n, graph, &dropped) {
        dropped[edge_idx] = true;
    }

    let order = topological_order(n, graph, |edge_idx| !dropped[edge_idx]);
    let mut rank = vec![0usize; n];
    for (pos, cell) in order.iter().enumerate() {
        rank[*cell] = pos;
    }
    for edge in graph.edges_mut() {
        edge.reversed = rank[edge.from] > rank[edge.to];
    }
}

fn longest_path_layers(graph: &LayerGraph) -> LayerAssignment {
    let n = graph.cell_count();
    let order = topological_order(n, graph, |_| true);
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in graph.edges() {
        let (from, to) = edge.layering_endpoints();
        outgoing[from].push(to);
    }
    let mut layers = vec![0usize; n];
    for cell in order {
        let next_layer = layers[cell] + 1;
        for &next in &outgoing[cell] {
            layers[next] = layers[next].max(next_layer);
        }
    }
    LayerAssignment { layers }
}

/// Kahn's algorithm over the layering direction of the edges accepted by
/// `keep`, picking the lowest ready cell index first. Any cell still blocked
/// by a cycle is released lowest index first.
fn topological_order(
    n: usize,
    graph: &LayerGraph,
    keep: impl Fn(usize) -> bool,
) -> Vec<usize> {
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indeg = vec![0usize; n];
    for (edge_idx, edge) in graph.edges().iter().enumerate() {
        if !keep(edge_idx) {
            continue;
        }
        let (from, to) = edge.layering_endpoints();
        outgoing[from].push(to);
        indeg[to] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|cell| indeg[*cell] == 0)
        .map(Reverse)
        .collect();
    let mut processed = vec![false; n];
    let mut order = Vec::with_capacity(n);
    loop {
        while let Some(Reverse(cell)) = ready.pop() {
            if processed[cell] {
                continue;
            }
            processed[cell] = true;
            order.push(cell);
            for &next in &outgoing[cell] {
                if processed[next] {
                    continue;
                }
                indeg[next] = indeg[next].saturating_sub(1);
                if indeg[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        if order.len() >= n {
            break;
        }
        match (0..n).find(|cell| !processed[*cell]) {
            Some(cell) => ready.push(Reverse(cell)),
            None => break,
        }
    }
    order
}

/// Back edges of an iterative DFS that visits roots and successors in
/// insertion order, skipping edges already marked in `skip`.
fn dfs_back_edges(n: usize, graph: &LayerGraph, skip: &[bool]) -> Vec<usize> {
    let mut outgoing: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for (edge_idx, edge) in graph.edges().iter().enumerate() {
        if !skip[edge_idx] {
            outgoing[edge.from].push((edge.to, edge_idx));
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let mut marks = vec![Mark::New; n];
    let mut back_edges = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for root in 0..n {
        if marks[root] != Mark::New {
            continue;
        }
        marks[root] = Mark::Active;
        stack.push((root, 0));
        while let Some(frame) = stack.last_mut() {
            let (cell, cursor) = *frame;
            if let Some(&(next, edge_idx)) = outgoing[cell].get(cursor) {
                frame.1 += 1;
                match marks[next] {
                    Mark::New => {
                        marks[next] = Mark::Active;
                        stack.push((next, 0));
                    }
                    Mark::Active => back_edges.push(edge_idx),
                    Mark::Done => {}
                }
            } else {
                marks[cell] = Mark::Done;
                stack.pop();
            }
        }
    }
    back_edges
}

/// Tarjan's SCC, iterative. Returns a component id per cell.
fn strongly_connected_components(n: usize, graph: &LayerGraph) -> Vec<usize> {
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in graph.edges() {
        outgoing[edge.from].push(edge.to);
    }

    const UNVISITED: usize = usize::MAX;
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut component = vec![UNVISITED; n];
    let mut scc_stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut next_component = 0usize;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        scc_stack.push(root);
        on_stack[root] = true;

        while let Some(frame) = call_stack.last_mut() {
            let (cell, cursor) = *frame;
            if let Some(&next) = outgoing[cell].get(cursor) {
                frame.1 += 1;
                if index[next] == UNVISITED {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    scc_stack.push(next);
                    on_stack[next] = true;
                    call_stack.push((next, 0));
                } else if on_stack[next] {
                    lowlink[cell] = lowlink[cell].min(index[next]);
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[cell]);
            }
            if lowlink[cell] == index[cell] {
                while let Some(member) = scc_stack.pop() {
                    on_stack[member] = false;
                    component[member] = next_component;
                    if member == cell {
                        break;
                    }
                }
                next_component += 1;
            }
        }
    }
    component
}
