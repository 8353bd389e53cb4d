use crate::prelude::*;
use clap::Parser;

mod board;
mod config;
mod diagnose;
mod docx;
mod error;
mod graph;
mod http;
mod parse;
mod pipeline;
mod prelude;
mod run;
mod serve;
mod summarize;
mod verify;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Summarize Teams meeting transcripts and post them as Trello cards"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Whether to display additional information.
    #[clap(long, env = "MINUTES_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Fetch the latest transcript, summarize it and post the card
    Run(crate::run::RunOptions),

    /// Microsoft Graph access checks (application permissions)
    Graph(crate::diagnose::App),

    /// Preview the card a Markdown summary turns into
    Parse(crate::parse::ParseOptions),

    /// Serve the upload API
    Serve(crate::serve::ServeOptions),

    /// Verify credentials and permissions
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Run(options) => crate::run::run(options, app.global).await,
        SubCommands::Graph(sub_app) => crate::diagnose::run(sub_app, app.global).await,
        SubCommands::Parse(options) => crate::parse::run(options, app.global).await,
        SubCommands::Serve(options) => crate::serve::run(options, app.global).await,
        SubCommands::Verify => crate::verify::run(app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
