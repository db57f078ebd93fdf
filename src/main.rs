fn main() {
    if let Err(err) = netlist_layout::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
