#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, load_config};
pub use ir::{Cell, Direction, Net, Netlist, PinOffset, Terminal};
pub use layout::{
    LayoutError, LayoutResult, NetGeometry, RoutingReport, Schematic, compute_layout,
    compute_schematic, route_nets,
};
