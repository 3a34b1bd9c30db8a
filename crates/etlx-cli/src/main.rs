//! 🚀 etlx — point it at a process config, get rows moved and a receipt printed.
//!
//! 📦 Everything interesting lives in the `etlx` library. This binary parses two
//! arguments, turns on logging (`RUST_LOG`), and turns the report into an exit code. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use etlx::ProcessReport;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🎛️ Run an etlx process: rows in, transformed rows out.
#[derive(Debug, Parser)]
#[command(name = "etlx", version, about)]
struct Cli {
    /// 📄 TOML config file. Without one, configuration comes from `ETLX_*` env vars only.
    config: Option<PathBuf>,
    /// 🧪 Build every transform chain and report problems without moving any data.
    #[arg(long)]
    check: bool,
}

/// 🚀 Exit 0 when every entity is ok, 1 for anything else: a missing file, a config
/// that won't parse, a chain that won't build, a row that errored.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 quiet unless RUST_LOG says otherwise
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 🔒 figment treats a missing TOML file as an empty one, so look before it leaps
    if let Some(config_file) = &cli.config {
        let exists = config_file.try_exists().with_context(|| {
            format!(
                "💀 Couldn't even check whether the configuration file exists. Was checking here: '{}'",
                config_file.display()
            )
        })?;
        if !exists {
            error!(
                "💀 Configuration file not found: '{}'. If it's a relative path, remember it's relative to where you ran etlx, not where you wish you had.",
                config_file.display()
            );
            std::process::exit(1);
        }
    }

    let app_config = etlx::app_config::load_config(cli.config.as_deref())
        .context("💀 The process configuration could not be loaded. Nothing was read, nothing was written.")?;

    let result = if cli.check {
        etlx::check(&app_config)
    } else {
        etlx::run(app_config).await
    };

    match result {
        Ok(report) => {
            println!("{report}");
            if !report.is_ok() {
                // -- 🧾 the receipt says something went sideways. the exit code agrees.
                println!("{}", problems_table(&report));
                std::process::exit(1);
            }
        }
        Err(err) => {
            // -- 🧅 outermost context first, root cause last
            for (depth, layer) in err.chain().enumerate() {
                error!("💀 [{depth}] {layer}");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

/// 📋 Every distinct problem, one per line, so nobody has to scroll the logs at 3am.
fn problems_table(report: &ProcessReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Entity", "Kind", "Message"]);
    for entity in &report.entities {
        let fatal = entity.fatal.iter().map(|m| ("fatal", m));
        let build = entity.build_errors.iter().map(|m| ("build", m));
        let row = entity.errors.iter().map(|m| ("row", m));
        for (kind, message) in fatal.chain(build).chain(row) {
            table.add_row(vec![entity.entity.as_str(), kind, message.as_str()]);
        }
    }
    table
}
