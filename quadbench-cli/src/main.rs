//! quadbench binary entry point.
//!
//! The same binary serves as coordinator (default) and as pool worker (when
//! re-invoked with the hidden worker flag).

fn main() {
    if let Err(e) = quadbench_cli::run() {
        eprintln!("quadbench: {e:#}");
        std::process::exit(1);
    }
}
