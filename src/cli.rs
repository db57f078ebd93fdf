use crate::config::load_config;
use crate::ir::{Direction, Netlist, parse_netlist};
use crate::layout::compute_schematic;
use crate::layout_dump::{read_layout_dump, write_layout_dump};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "netlayout", version, about = "Layered schematic layout and orthogonal wire routing")]
pub struct Args {
    /// Netlist JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout dump. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Layer direction, overriding the config file
    #[arg(short = 'd', long = "direction", value_enum)]
    pub direction: Option<DirectionArg>,

    /// Previous layout dump; unchanged layers keep their positions
    #[arg(short = 'p', long = "previous")]
    pub previous: Option<PathBuf>,

    /// Exit with an error when any net had to be routed with a compromise
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DirectionArg {
    #[value(name = "LR")]
    Lr,
    #[value(name = "RL")]
    Rl,
    #[value(name = "TB", alias = "TD")]
    Tb,
    #[value(name = "BT")]
    Bt,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Lr => Direction::LeftRight,
            DirectionArg::Rl => Direction::RightLeft,
            DirectionArg::Tb => Direction::TopBottom,
            DirectionArg::Bt => Direction::BottomTop,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(direction) = args.direction {
        config.layout.direction = direction.into();
    }

    let netlist = read_netlist(args.input.as_deref())?;
    let previous = match args.previous.as_deref() {
        Some(path) => Some(read_layout_dump(path)?.to_layout_result()?),
        None => None,
    };

    let schematic = compute_schematic(&netlist, &config.layout, previous.as_ref())?;
    write_layout_dump(args.output.as_deref(), &schematic)?;

    let report = &schematic.report;
    if args.strict && report.is_degraded() {
        let nets: Vec<&str> = report.degraded().iter().map(|entry| entry.net.as_str()).collect();
        return Err(anyhow::anyhow!(
            "{} net(s) could not be routed cleanly: {}",
            report.degraded_count(),
            nets.join(", ")
        ));
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_netlist(path: Option<&Path>) -> Result<Netlist> {
    let mut buf = String::new();
    match path {
        Some(path) if path != Path::new("-") => {
            buf = std::fs::read_to_string(path)?;
        }
        _ => {
            io::stdin().read_to_string(&mut buf)?;
        }
    }
    parse_netlist(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direction_override_and_strict_flag() {
        let args = Args::try_parse_from([
            "netlayout",
            "-i",
            "net.json",
            "--direction",
            "TD",
            "--strict",
        ])
        .unwrap();
        assert_eq!(args.input.as_deref(), Some(Path::new("net.json")));
        assert_eq!(args.direction.map(Direction::from), Some(Direction::TopBottom));
        assert!(args.strict);
        assert!(args.previous.is_none());
    }

    #[test]
    fn rejects_unknown_direction() {
        assert!(Args::try_parse_from(["netlayout", "--direction", "up"]).is_err());
    }
}
