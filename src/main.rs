use clap::Parser;
use log::{info, warn};
use snafu::ErrorCompat;

mod args;
mod pipeline;

use crate::args::Args;

fn main() {
    let args = Args::parse();
    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();
    info!("args: {:?}", args);

    match pipeline::run_crosswalk(&args) {
        Ok(outcome) => {
            info!(
                "Wrote {} FSA measures (crosswalk {})",
                outcome.aggregated.len(),
                outcome.crosswalk.fingerprint()
            );
        }
        Err(e) => {
            warn!("Error occured {:?}", e);
            eprintln!("An error occured: {}", e);
            if let Some(bt) = ErrorCompat::backtrace(&e) {
                eprintln!("trace: {}", bt);
            }
            std::process::exit(1);
        }
    }
}
