//! odincode-fix: backup, diff, confirm and apply fix suggestions

use clap::Parser;

use odincode_fix::cli::{run_cli, Cli};
use odincode_fix::logging::init_logging;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let code = run_cli(cli).await;
    std::process::ExitCode::from(code.clamp(0, 255) as u8)
}
