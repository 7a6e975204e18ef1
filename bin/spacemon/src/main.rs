//! Main entrypoint for the spacemon binary.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use anyhow::Result;
use clap::Parser;
use spacemon::{init_tracing_subscriber, Cli, Command, Config};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_subscriber(cli.v)?;
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Ingest(args) => spacemon::ingest(&config, args.repair_policy()).await?,
        Command::Compile => spacemon::compile(&config).await?,
    }

    info!(target: "spacemon", "Exiting spacemon.");
    Ok(())
}
