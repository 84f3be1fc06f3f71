use std::fs::File;

use anyhow::{Context, Result};
use custody_ledger::{bin_utils::Service, config::LedgerConfig, logging::init_logging};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let filename = args
        .next()
        .context("Expected a script file name as the first argument")?;
    let config = match args.next() {
        Some(path) => LedgerConfig::load(&path)?,
        None => LedgerConfig::default(),
    };
    init_logging(&config.logging)?;

    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;
    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config,
        error_printer: Box::new(|line, err| {
            if err.is_rejection() {
                eprintln!("Rejected at line {line}: {err}");
            } else {
                eprintln!("Error at line {line}: {err}");
            }
        }),
    };
    service.run()
}
