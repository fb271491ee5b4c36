mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 初始化日志系统
    apiforge::logger::init_logger(cli.verbose);

    match cli.command {
        Commands::Compile { scenario, output } => {
            cli::compile_scenario(&scenario, output.as_deref())
        }
        Commands::Run(args) => cli::run(args, cli.verbose).await,
    }
}
