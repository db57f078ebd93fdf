use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use netlist_layout::config::LayoutConfig;
use netlist_layout::ir::{Cell, Netlist};
use netlist_layout::layout::{compute_layout, compute_schematic, route_nets};
use std::hint::black_box;

fn gate(id: String) -> Cell {
    Cell::new(id, 40.0, 30.0)
        .with_pin("a", 0.0, 10.0)
        .with_pin("b", 0.0, 20.0)
        .with_pin("y", 40.0, 15.0)
}

/// `columns` x `rows` gates, each driving the next column twice, with a
/// register feedback every few rows.
fn mesh_netlist(columns: usize, rows: usize) -> Netlist {
    let mut netlist = Netlist::new();
    let name = |c: usize, r: usize| format!("g{c}_{r}");
    for c in 0..columns {
        for r in 0..rows {
            let cell = gate(name(c, r)).sequential(c == 0);
            netlist.add_cell(cell);
        }
    }
    for c in 0..columns.saturating_sub(1) {
        for r in 0..rows {
            let driver = name(c, r);
            let straight = name(c + 1, r);
            let diagonal = name(c + 1, (r + 1) % rows);
            netlist.add_net(
                format!("n{c}_{r}"),
                (driver.as_str(), "y"),
                &[(straight.as_str(), "a"), (diagonal.as_str(), "b")],
            );
        }
    }
    if columns > 1 {
        for r in (0..rows).step_by(3) {
            let driver = name(columns - 1, r);
            let target = name(0, r);
            netlist.add_net(format!("fb{r}"), (driver.as_str(), "y"), &[(target.as_str(), "a")]);
        }
    }
    netlist
}

const SIZES: [(usize, usize); 3] = [(4, 4), (8, 8), (16, 12)];

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    for (columns, rows) in SIZES {
        let netlist = mesh_netlist(columns, rows);
        let label = format!("{columns}x{rows}");
        group.bench_with_input(BenchmarkId::from_parameter(label), &netlist, |b, data| {
            b.iter(|| {
                let layout = compute_layout(black_box(data), &config, None).expect("layout failed");
                black_box(layout.crossings());
            });
        });
    }
    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");
    let config = LayoutConfig::default();
    for (columns, rows) in SIZES {
        let netlist = mesh_netlist(columns, rows);
        let layout = compute_layout(&netlist, &config, None).expect("layout failed");
        let label = format!("{columns}x{rows}");
        group.bench_with_input(BenchmarkId::from_parameter(label), &layout, |b, data| {
            b.iter(|| {
                let routed = route_nets(&netlist, black_box(data), &config).expect("routing failed");
                black_box(routed.report.degraded_count());
            });
        });
    }
    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental");
    let config = LayoutConfig::default();
    let (columns, rows) = SIZES[1];
    let base = mesh_netlist(columns, rows);
    let previous = compute_layout(&base, &config, None).expect("layout failed");
    let mut grown = base.clone();
    grown.add_cell(gate("tail".to_string()));
    let last = format!("g{}_0", columns - 1);
    grown.add_net("tail_net", (last.as_str(), "y"), &[("tail", "a")]);
    group.bench_function("append_one_layer", |b| {
        b.iter(|| {
            let schematic =
                compute_schematic(black_box(&grown), &config, Some(&previous)).expect("layout failed");
            black_box(schematic.nets.len());
        });
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_layout, bench_routing, bench_incremental
);
criterion_main!(benches);
