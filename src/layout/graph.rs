use std::collections::{HashMap, HashSet};

use crate::ir::Netlist;

use super::error::ContractViolation;

/// Cell-to-cell signal-flow edge collapsed from a net (driver -> load).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellEdge {
    pub from: usize,
    pub to: usize,
    /// Index of the first net that produced this edge.
    pub net: usize,
    /// Flipped for layering only; the netlist keeps its direction.
    pub reversed: bool,
}

impl CellEdge {
    /// Endpoints as seen by the layering stage.
    pub fn layering_endpoints(&self) -> (usize, usize) {
        if self.reversed {
            (self.to, self.from)
        } else {
            (self.from, self.to)
        }
    }
}

/// Edge arena over the visible cells. Cells are indexed in netlist order and
/// edges in first-seen order, which is the deterministic tie-breaker used by
/// every later stage.
#[derive(Debug, Clone)]
pub struct LayerGraph {
    cell_ids: Vec<String>,
    index: HashMap<String, usize>,
    sequential: Vec<bool>,
    edges: Vec<CellEdge>,
    self_loops: usize,
}

impl LayerGraph {
    pub fn from_netlist(netlist: &Netlist) -> Result<Self, ContractViolation> {
        validate_netlist(netlist)?;

        let mut index = HashMap::with_capacity(netlist.cells.len());
        let mut cell_ids = Vec::with_capacity(netlist.cells.len());
        let mut sequential = Vec::with_capacity(netlist.cells.len());
        for (idx, cell) in netlist.cells.iter().enumerate() {
            index.insert(cell.id.clone(), idx);
            cell_ids.push(cell.id.clone());
            sequential.push(cell.sequential);
        }

        let mut edges = Vec::new();
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut self_loops = 0usize;
        for (net_idx, net) in netlist.nets.iter().enumerate() {
            let Some(driver) = net.driver() else {
                continue;
            };
            let from = index[&driver.cell];
            for load in net.loads() {
                let to = index[&load.cell];
                if from == to {
                    self_loops += 1;
                    continue;
                }
                if seen.insert((from, to)) {
                    edges.push(CellEdge {
                        from,
                        to,
                        net: net_idx,
                        reversed: false,
                    });
                }
            }
        }

        Ok(Self {
            cell_ids,
            index,
            sequential,
            edges,
            self_loops,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cell_ids.len()
    }

    pub fn cell_id(&self, idx: usize) -> &str {
        &self.cell_ids[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn is_sequential(&self, idx: usize) -> bool {
        self.sequential[idx]
    }

    pub fn edges(&self) -> &[CellEdge] {
        &self.edges
    }

    pub(crate) fn edges_mut(&mut self) -> &mut [CellEdge] {
        &mut self.edges
    }

    pub fn reversed_edges(&self) -> impl Iterator<Item = &CellEdge> {
        self.edges.iter().filter(|edge| edge.reversed)
    }

    /// Driver and load on the same cell; not representable as a layering edge.
    pub fn self_loop_count(&self) -> usize {
        self.self_loops
    }
}

/// Checks the caller's side of the contract: unique ids, sane extents, and
/// nets whose terminals resolve to known cell pins.
pub fn validate_netlist(netlist: &Netlist) -> Result<(), ContractViolation> {
    let mut cells: HashMap<&str, &crate::ir::Cell> = HashMap::with_capacity(netlist.cells.len());
    for cell in &netlist.cells {
        let extent_ok = cell.width.is_finite()
            && cell.height.is_finite()
            && cell.width >= 0.0
            && cell.height >= 0.0;
        if !extent_ok {
            return Err(ContractViolation::InvalidCellExtent {
                cell: cell.id.clone(),
                width: cell.width,
                height: cell.height,
            });
        }
        if cells.insert(cell.id.as_str(), cell).is_some() {
            return Err(ContractViolation::DuplicateCell(cell.id.clone()));
        }
    }

    let mut nets: HashSet<&str> = HashSet::with_capacity(netlist.nets.len());
    for net in &netlist.nets {
        if !nets.insert(net.id.as_str()) {
            return Err(ContractViolation::DuplicateNet(net.id.clone()));
        }
        if net.terminals.is_empty() {
            return Err(ContractViolation::EmptyNet {
                net: net.id.clone(),
            });
        }
        for terminal in &net.terminals {
            let Some(cell) = cells.get(terminal.cell.as_str()) else {
                return Err(ContractViolation::UnknownCell {
                    net: net.id.clone(),
                    cell: terminal.cell.clone(),
                });
            };
            if cell.pin(&terminal.pin).is_none() {
                return Err(ContractViolation::UnresolvedPin {
                    net: net.id.clone(),
                    cell: terminal.cell.clone(),
                    pin: terminal.pin.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Cell, Net};

    fn gate(id: &str) -> Cell {
        Cell::new(id, 40.0, 30.0)
            .with_pin("a", 0.0, 15.0)
            .with_pin("y", 40.0, 15.0)
    }

    #[test]
    fn collapses_nets_into_deduplicated_edges() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A")).add_cell(gate("B")).add_cell(gate("C"));
        netlist.add_net("n1", ("A", "y"), &[("B", "a"), ("C", "a")]);
        netlist.add_net("n2", ("A", "y"), &[("B", "a")]);
        netlist.add_net("n3", ("C", "y"), &[("C", "a")]);

        let graph = LayerGraph::from_netlist(&netlist).unwrap();
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.edges()[0].layering_endpoints(), (0, 1));
        assert_eq!(graph.edges()[1].layering_endpoints(), (0, 2));
        assert_eq!(graph.self_loop_count(), 1);
        assert_eq!(graph.index_of("C"), Some(2));
    }

    #[test]
    fn rejects_net_without_terminals() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A"));
        netlist.nets.push(Net {
            id: "floating".to_string(),
            terminals: Vec::new(),
        });
        assert_eq!(
            LayerGraph::from_netlist(&netlist).unwrap_err(),
            ContractViolation::EmptyNet {
                net: "floating".to_string()
            }
        );
    }

    #[test]
    fn rejects_unresolved_pin_offset() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A")).add_cell(gate("B"));
        netlist.add_net("n1", ("A", "q"), &[("B", "a")]);
        assert!(matches!(
            validate_netlist(&netlist),
            Err(ContractViolation::UnresolvedPin { pin, .. }) if pin == "q"
        ));
    }

    #[test]
    fn rejects_unknown_cell_and_duplicates() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A"));
        netlist.add_net("n1", ("A", "y"), &[("Z", "a")]);
        assert!(matches!(
            validate_netlist(&netlist),
            Err(ContractViolation::UnknownCell { cell, .. }) if cell == "Z"
        ));

        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A")).add_cell(gate("A"));
        assert_eq!(
            validate_netlist(&netlist),
            Err(ContractViolation::DuplicateCell("A".to_string()))
        );
    }

    #[test]
    fn rejects_negative_extent() {
        let mut netlist = Netlist::new();
        netlist.add_cell(Cell::new("A", -1.0, 10.0));
        assert!(matches!(
            validate_netlist(&netlist),
            Err(ContractViolation::InvalidCellExtent { .. })
        ));
    }
}
