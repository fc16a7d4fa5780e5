use clap::Parser as _;
use netcoord_analyser::cli::NetcoordCli;

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    env_logger::try_init()?;

    let cli = NetcoordCli::parse();
    log::info!("{CRATE_NAME} {CRATE_VERSION}");

    netcoord_analyser::execute_command(cli)
}
