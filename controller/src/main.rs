use clap::{Parser, Subcommand};

use common::telemetry::init_telemetry;

use controller::command::nodes::{NodesArgs, nodes};
use controller::command::serve::{ServeArgs, serve};
use controller::command::transfer::{TransferArgs, transfer};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// Run the controller (node protocol listener, membership monitor, admin API)
    Serve(ServeArgs),
    /// Plan a simulated transfer
    Transfer(TransferArgs),
    /// Show the registry snapshot and network stats
    Nodes(NodesArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("controller");

    let args = Args::parse();

    match args.cmd {
        Cmd::Serve(serve_args) => {
            serve(serve_args).await?;
        }
        Cmd::Transfer(transfer_args) => {
            transfer(transfer_args).await?;
        }
        Cmd::Nodes(nodes_args) => {
            nodes(nodes_args).await?;
        }
    }

    Ok(())
}
