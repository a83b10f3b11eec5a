use std::path::PathBuf;

use clap::Parser;
use webgen_lib::errors::WebGenResult;
use webgen_lib::RunOptions;

#[derive(Parser)]
#[command(name = "webgen")]
#[command(about = "Run a natural-language command against the current browser page", long_about = None)]
#[command(version)]
struct Cli {
    /// Command text, e.g. `Search for shoes`
    #[arg(required_unless_present = "history")]
    command: Vec<String>,

    /// Open this page before sending the command
    #[arg(long)]
    url: Option<String>,

    /// Path to config.toml (default: next to the executable, then the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the command history for the configured user and exit
    #[arg(long)]
    history: bool,
}

#[tokio::main]
async fn main() -> WebGenResult<()> {
    let cli = Cli::parse();
    let command = (!cli.command.is_empty()).then(|| cli.command.join(" "));

    webgen_lib::run(RunOptions {
        command,
        url: cli.url,
        config: cli.config,
        history: cli.history,
    })
    .await
}
