use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Signal-flow direction of the drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
    #[serde(rename = "TB", alias = "TD")]
    TopBottom,
    #[serde(rename = "BT")]
    BottomTop,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "LR" => Some(Self::LeftRight),
            "RL" => Some(Self::RightLeft),
            "TB" | "TD" => Some(Self::TopBottom),
            "BT" => Some(Self::BottomTop),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::LeftRight => "LR",
            Self::RightLeft => "RL",
            Self::TopBottom => "TB",
            Self::BottomTop => "BT",
        }
    }

    /// Layers advance along the x axis.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }
}

/// Pin location relative to the top-left corner of its cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinOffset {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub width: f64,
    pub height: f64,
    /// Latch/flip-flop boundary, preferred place to break feedback loops.
    #[serde(default)]
    pub sequential: bool,
    #[serde(default)]
    pub pins: BTreeMap<String, PinOffset>,
}

impl Cell {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            sequential: false,
            pins: BTreeMap::new(),
        }
    }

    pub fn with_pin(mut self, name: impl Into<String>, x: f64, y: f64) -> Self {
        self.pins.insert(name.into(), PinOffset { x, y });
        self
    }

    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    pub fn pin(&self, name: &str) -> Option<PinOffset> {
        self.pins.get(name).copied()
    }
}

/// One end of a net, resolved to a cell pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Terminal {
    pub cell: String,
    pub pin: String,
}

impl Terminal {
    pub fn new(cell: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            cell: cell.into(),
            pin: pin.into(),
        }
    }
}

/// A visible net. The first terminal is the driver, the rest are loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    pub id: String,
    pub terminals: Vec<Terminal>,
}

impl Net {
    pub fn driver(&self) -> Option<&Terminal> {
        self.terminals.first()
    }

    pub fn loads(&self) -> &[Terminal] {
        self.terminals.get(1..).unwrap_or(&[])
    }
}

/// Read-only view of the visible subgraph handed over by the netlist
/// collaborator. Insertion order of cells and nets is significant: it is the
/// tie-breaker everywhere the pipeline needs a deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Netlist {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub nets: Vec<Net>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cell(&mut self, cell: Cell) -> &mut Self {
        self.cells.push(cell);
        self
    }

    /// Adds a net driven by `driver` and loading every entry of `loads`.
    pub fn add_net(
        &mut self,
        id: impl Into<String>,
        driver: (&str, &str),
        loads: &[(&str, &str)],
    ) -> &mut Self {
        let mut terminals = Vec::with_capacity(loads.len() + 1);
        terminals.push(Terminal::new(driver.0, driver.1));
        for (cell, pin) in loads {
            terminals.push(Terminal::new(*cell, *pin));
        }
        self.nets.push(Net {
            id: id.into(),
            terminals,
        });
        self
    }

    pub fn cell(&self, id: &str) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

pub fn load_netlist(path: &Path) -> anyhow::Result<Netlist> {
    let contents = std::fs::read_to_string(path)?;
    parse_netlist(&contents)
}

pub fn parse_netlist(contents: &str) -> anyhow::Result<Netlist> {
    let netlist: Netlist = serde_json::from_str(contents)?;
    Ok(netlist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direction_tokens() {
        assert_eq!(Direction::from_token("LR"), Some(Direction::LeftRight));
        assert_eq!(Direction::from_token("TD"), Some(Direction::TopBottom));
        assert_eq!(Direction::from_token("BT"), Some(Direction::BottomTop));
        assert_eq!(Direction::from_token("XY"), None);
        assert!(Direction::RightLeft.is_horizontal());
        assert!(!Direction::BottomTop.is_horizontal());
    }

    #[test]
    fn parses_netlist_json() {
        let input = r#"{
            "cells": [
                {"id": "u1", "width": 40, "height": 30, "pins": {"y": {"x": 40, "y": 15}}},
                {"id": "ff", "width": 40, "height": 30, "sequential": true,
                 "pins": {"d": {"x": 0, "y": 15}}}
            ],
            "nets": [
                {"id": "n1", "terminals": [{"cell": "u1", "pin": "y"}, {"cell": "ff", "pin": "d"}]}
            ]
        }"#;
        let netlist = parse_netlist(input).unwrap();
        assert_eq!(netlist.cells.len(), 2);
        assert!(netlist.cell("ff").unwrap().sequential);
        assert_eq!(netlist.nets[0].driver().unwrap().cell, "u1");
        assert_eq!(netlist.nets[0].loads().len(), 1);
    }

    #[test]
    fn net_without_terminals_has_no_driver() {
        let net = Net {
            id: "empty".to_string(),
            terminals: Vec::new(),
        };
        assert!(net.driver().is_none());
        assert!(net.loads().is_empty());
    }
}
