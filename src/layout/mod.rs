mod error;
mod fanout;
mod graph;
mod net_geometry;
mod ordering;
pub(crate) mod placement;
mod ranking;
mod routing;
pub(crate) mod types;
pub use error::*;
pub use graph::{CellEdge, LayerGraph, validate_netlist};
pub use net_geometry::*;
pub use ordering::{LayerOrder, OrderHints, count_crossings, minimize_crossings};
pub use placement::CoordinateAssigner;
pub use ranking::{LayerAssignment, assign_layers};
pub use routing::{DegradedReason, DegradedRouting, OrthogonalRouter, RoutedNets, RoutingReport};
pub use types::*;

use crate::config::LayoutConfig;
use crate::ir::Netlist;

/// A placed and routed netlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Schematic {
    pub layout: LayoutResult,
    pub nets: Vec<NetGeometry>,
    pub report: RoutingReport,
}

/// Places every cell of `netlist`.
///
/// With a `previous` result, layers that are unchanged since then keep
/// their cells exactly where they were.
pub fn compute_layout(
    netlist: &Netlist,
    config: &LayoutConfig,
    previous: Option<&LayoutResult>,
) -> Result<LayoutResult> {
    config.validate()?;
    let mut graph = LayerGraph::from_netlist(netlist)?;
    let assignment = assign_layers(&mut graph);
    let assigner = CoordinateAssigner::new(netlist, &graph, &assignment, config, previous);
    let order = minimize_crossings(
        &graph,
        &assignment,
        config.crossing_minimizer_passes,
        &assigner.order_hints(),
    );
    let crossings = count_crossings(&graph, &assignment, &order);
    let layout = assigner.assign(&order, crossings);
    tracing::debug!(
        cells = netlist.cells.len(),
        nets = netlist.nets.len(),
        layers = layout.layer_count(),
        reversed = graph.reversed_edges().count(),
        pinned = assigner.pinned_layers().iter().filter(|p| **p).count(),
        crossings,
        "computed layout"
    );
    Ok(layout)
}

/// Routes every net of `netlist` over an existing placement.
pub fn route_nets(
    netlist: &Netlist,
    layout: &LayoutResult,
    config: &LayoutConfig,
) -> Result<RoutedNets> {
    config.validate()?;
    validate_netlist(netlist)?;
    let routed = OrthogonalRouter::new(netlist, layout, config)?.route_all();
    for geometry in &routed.geometries {
        geometry.validate()?;
    }
    Ok(routed)
}

/// Placement followed by routing.
pub fn compute_schematic(
    netlist: &Netlist,
    config: &LayoutConfig,
    previous: Option<&LayoutResult>,
) -> Result<Schematic> {
    let layout = compute_layout(netlist, config, previous)?;
    let RoutedNets { geometries, report } = route_nets(netlist, &layout, config)?;
    Ok(Schematic {
        layout,
        nets: geometries,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Cell;

    fn gate(id: &str) -> Cell {
        Cell::new(id, 40.0, 30.0)
            .with_pin("a", 0.0, 15.0)
            .with_pin("y", 40.0, 15.0)
    }

    #[test]
    fn empty_netlist_lays_out_to_nothing() {
        let schematic =
            compute_schematic(&Netlist::new(), &LayoutConfig::default(), None).unwrap();
        assert!(schematic.layout.is_empty());
        assert!(schematic.nets.is_empty());
        assert!(!schematic.report.is_degraded());
    }

    #[test]
    fn contract_violations_fail_before_any_result() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A"));
        netlist.add_net("n1", ("A", "y"), &[("missing", "a")]);
        let err = compute_layout(&netlist, &LayoutConfig::default(), None).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::Contract(ContractViolation::UnknownCell { .. })
        ));

        let config = LayoutConfig {
            layer_spacing: 0.0,
            ..LayoutConfig::default()
        };
        let err = compute_layout(&Netlist::new(), &config, None).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::Contract(ContractViolation::InvalidConfig(_))
        ));
    }

    #[test]
    fn routing_needs_every_cell_placed() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A"));
        let layout = compute_layout(&netlist, &LayoutConfig::default(), None).unwrap();
        netlist.add_cell(gate("B"));
        let err = route_nets(&netlist, &layout, &LayoutConfig::default()).unwrap_err();
        assert_eq!(
            err,
            LayoutError::Contract(ContractViolation::UnplacedCell("B".to_string()))
        );
    }

    #[test]
    fn self_loop_net_is_still_routed() {
        let mut netlist = Netlist::new();
        netlist.add_cell(gate("A"));
        netlist.add_net("loop", ("A", "y"), &[("A", "a")]);
        let schematic = compute_schematic(&netlist, &LayoutConfig::default(), None).unwrap();
        assert_eq!(schematic.nets.len(), 1);
        assert!(!schematic.nets[0].is_empty());
        schematic.nets[0].validate().unwrap();
    }
}
