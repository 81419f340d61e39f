#![allow(clippy::multiple_crate_versions)]

//! rxdesk binary: `rxdesk serve` runs the desk, every other subcommand talks to it.

fn main() {
    if let Err(err) = rxdesk_lib::cli::run() {
        eprintln!("rxdesk: {err}");
        std::process::exit(1);
    }
}
