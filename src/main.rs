pub mod action;
pub mod app;
pub mod cli;
pub mod config;
pub mod enums;
pub mod export;
pub mod privilege;
pub mod scan;
pub mod utils;

use clap::Parser;
use cli::Cli;
use color_eyre::eyre::Result;

use crate::{
  app::App,
  enums::ScanKind,
  utils::{initialize_logging, initialize_panic_handler},
};

async fn tokio_main() -> Result<()> {
  let args = Cli::parse();

  initialize_logging(args.verbose)?;

  initialize_panic_handler()?;

  // ARP needs raw sockets; without them host discovery falls back to the neighbor cache
  if args.command.scan_kinds().contains(&ScanKind::Hosts) && !privilege::has_network_privileges() {
    eprintln!("WARNING: Running without elevated privileges.");
    eprintln!("Host discovery will only see the neighbor cache.");
    eprintln!("{}", privilege::privilege_hint());
    eprintln!();
  }

  let mut app = App::new(&args)?;
  app.run().await?;

  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  if let Err(e) = tokio_main().await {
    eprintln!("{} error: Something went wrong", env!("CARGO_PKG_NAME"));
    Err(e)
  } else {
    Ok(())
  }
}
