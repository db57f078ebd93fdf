use crate::ir::Direction;
use crate::layout::ContractViolation;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Distance between the leading edges of adjacent layers.
    pub layer_spacing: f64,
    /// Gap between stacked cells inside one layer before alignment.
    pub cell_spacing: f64,
    /// Smallest gap the alignment pass may leave between two cells.
    pub min_cell_gap: f64,
    pub direction: Direction,
    pub prefer_horizontal: bool,
    /// Minimum width of the routing band between two layers.
    pub channel_width: f64,
    pub min_wire_spacing: f64,
    pub crossing_minimizer_passes: usize,
    pub alignment_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            layer_spacing: 160.0,
            cell_spacing: 30.0,
            min_cell_gap: 20.0,
            direction: Direction::LeftRight,
            prefer_horizontal: true,
            channel_width: 60.0,
            min_wire_spacing: 8.0,
            crossing_minimizer_passes: 8,
            alignment_passes: 4,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ContractViolation> {
        let spacings = [
            ("layer_spacing", self.layer_spacing),
            ("cell_spacing", self.cell_spacing),
            ("channel_width", self.channel_width),
            ("min_wire_spacing", self.min_wire_spacing),
        ];
        for (name, value) in spacings {
            if !value.is_finite() || value <= 0.0 {
                return Err(ContractViolation::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if !self.min_cell_gap.is_finite() || self.min_cell_gap < 0.0 {
            return Err(ContractViolation::InvalidConfig(format!(
                "min_cell_gap must be non-negative, got {}",
                self.min_cell_gap
            )));
        }
        Ok(())
    }

    /// Gap enforced by the alignment pass.
    pub(crate) fn alignment_gap(&self) -> f64 {
        self.min_cell_gap.min(self.cell_spacing)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub layout: LayoutConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    layer_spacing: Option<f64>,
    cell_spacing: Option<f64>,
    min_cell_gap: Option<f64>,
    direction: Option<String>,
    prefer_horizontal: Option<bool>,
    channel_width: Option<f64>,
    min_wire_spacing: Option<f64>,
    crossing_minimizer_passes: Option<usize>,
    alignment_passes: Option<usize>,
}

/// Loads a JSON5 config file on top of the defaults. Unknown direction tokens
/// are rejected so a typo does not silently fall back to left-to-right.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = json5::from_str(&contents)?;

    if let Some(layout) = parsed.layout {
        let target = &mut config.layout;
        if let Some(v) = layout.layer_spacing {
            target.layer_spacing = v;
        }
        if let Some(v) = layout.cell_spacing {
            target.cell_spacing = v;
        }
        if let Some(v) = layout.min_cell_gap {
            target.min_cell_gap = v;
        }
        if let Some(token) = layout.direction.as_deref() {
            target.direction = Direction::from_token(token)
                .ok_or_else(|| anyhow::anyhow!("unknown layout direction `{token}`"))?;
        }
        if let Some(v) = layout.prefer_horizontal {
            target.prefer_horizontal = v;
        }
        if let Some(v) = layout.channel_width {
            target.channel_width = v;
        }
        if let Some(v) = layout.min_wire_spacing {
            target.min_wire_spacing = v;
        }
        if let Some(v) = layout.crossing_minimizer_passes {
            target.crossing_minimizer_passes = v;
        }
        if let Some(v) = layout.alignment_passes {
            target.alignment_passes = v;
        }
    }

    config.layout.validate()?;
    Ok(config)
}
