use crate::ir::Direction;
use crate::layout::{LayoutResult, NetGeometryRecord, Position, RoutingReport, Schematic};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDump {
    pub direction: String,
    pub width: f64,
    pub height: f64,
    pub crossings: usize,
    pub cells: Vec<CellDump>,
    #[serde(default)]
    pub nets: Vec<NetGeometryRecord>,
    #[serde(default)]
    pub report: RoutingReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDump {
    pub id: String,
    pub layer: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutDump {
    pub fn from_schematic(schematic: &Schematic) -> Self {
        let layout = &schematic.layout;
        let cells = layout
            .positions()
            .iter()
            .map(|(id, position)| CellDump {
                id: id.clone(),
                layer: layout.layer(id).unwrap_or_default(),
                x: position.x,
                y: position.y,
                width: position.width,
                height: position.height,
            })
            .collect();
        let bounds = layout.bounds();

        LayoutDump {
            direction: layout.direction().token().to_string(),
            width: bounds.width(),
            height: bounds.height(),
            crossings: layout.crossings(),
            cells,
            nets: schematic.nets.iter().map(|net| net.to_record()).collect(),
            report: schematic.report.clone(),
        }
    }

    /// Rebuilds the placement part, used as the previous layout of an
    /// incremental run.
    pub fn to_layout_result(&self) -> anyhow::Result<LayoutResult> {
        let direction = Direction::from_token(&self.direction)
            .with_context(|| format!("unknown direction `{}` in layout dump", self.direction))?;
        let mut positions = BTreeMap::new();
        let mut layers = BTreeMap::new();
        for cell in &self.cells {
            positions.insert(
                cell.id.clone(),
                Position {
                    x: cell.x,
                    y: cell.y,
                    width: cell.width,
                    height: cell.height,
                },
            );
            layers.insert(cell.id.clone(), cell.layer);
        }
        Ok(LayoutResult::new(positions, layers, direction, self.crossings))
    }
}

pub fn write_layout_dump(path: Option<&Path>, schematic: &Schematic) -> anyhow::Result<()> {
    let dump = LayoutDump::from_schematic(schematic);
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

pub fn read_layout_dump(path: &Path) -> anyhow::Result<LayoutDump> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let dump = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing layout dump {}", path.display()))?;
    Ok(dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::{Cell, Netlist};
    use crate::layout::compute_schematic;

    fn schematic() -> Schematic {
        let mut netlist = Netlist::new();
        netlist
            .add_cell(Cell::new("A", 40.0, 30.0).with_pin("y", 40.0, 15.0))
            .add_cell(Cell::new("B", 40.0, 30.0).with_pin("a", 0.0, 15.0));
        netlist.add_net("n1", ("A", "y"), &[("B", "a")]);
        compute_schematic(&netlist, &LayoutConfig::default(), None).unwrap()
    }

    #[test]
    fn dump_reloads_into_the_same_placement() {
        let schematic = schematic();
        let dump = LayoutDump::from_schematic(&schematic);
        assert_eq!(dump.direction, "LR");
        assert_eq!(dump.cells.len(), 2);
        assert_eq!(dump.nets.len(), 1);

        let json = serde_json::to_string(&dump).unwrap();
        let parsed: LayoutDump = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.to_layout_result().unwrap(), schematic.layout);
    }

    #[test]
    fn rejects_unknown_direction() {
        let mut dump = LayoutDump::from_schematic(&schematic());
        dump.direction = "sideways".to_string();
        assert!(dump.to_layout_result().is_err());
    }

    #[test]
    fn writes_and_reads_a_dump_file() {
        let schematic = schematic();
        let path = std::env::temp_dir().join(format!("netlayout-dump-{}.json", std::process::id()));
        write_layout_dump(Some(&path), &schematic).unwrap();
        let dump = read_layout_dump(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(dump, LayoutDump::from_schematic(&schematic));
    }
}
