use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use storyloom::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    storyloom::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let book = cli.book;
    match cli.command {
        Command::Init(args) => {
            storyloom::edit::init(&book, args).context("init")?;
        }
        Command::Show(args) => {
            storyloom::outline::run(&book, args).context("show")?;
        }
        Command::Act { command } => {
            storyloom::edit::act(&book, command).context("act")?;
        }
        Command::Chapter { command } => {
            storyloom::edit::chapter(&book, command).context("chapter")?;
        }
        Command::Section { command } => {
            storyloom::edit::section(&book, command).context("section")?;
        }
        Command::Codex { command } => {
            storyloom::edit::codex(&book, command).context("codex")?;
        }
        Command::Filter(args) => {
            storyloom::filter::run(&book, args).context("filter")?;
        }
        Command::Export(args) => {
            storyloom::export::run(&book, args).context("export")?;
        }
        Command::Llm(args) => {
            storyloom::llm::run(&book, args).await.context("llm")?;
        }
        Command::Prompts(args) => {
            storyloom::prompts::run(args).context("prompts")?;
        }
        Command::Ipc(args) => {
            storyloom::ipc::run(&book, args).await.context("ipc")?;
        }
    }

    Ok(())
}
