use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use jira_notes::app::{App, BlockKind};
use jira_notes::config::Config;
use jira_notes::logging;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "jira-notes")]
#[command(about = "Render Jira searches, counts and issues inside Markdown notes")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jira-notes/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Alias of the account to query (default: lowest priority)
  #[arg(short, long)]
  account: Option<String>,

  /// Folder of Markdown notes to link issues to
  #[arg(short, long)]
  notes: Option<PathBuf>,

  /// Ignore cached results and fetch again
  #[arg(short, long)]
  refresh: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Render the body of a jira-search block
  Search { file: Option<PathBuf> },
  /// Render the body of a jira-count block
  Count { file: Option<PathBuf> },
  /// Render a list of issue keys
  Issue { file: Option<PathBuf> },
  /// Replace inline issue tags with badges
  Inline { file: Option<PathBuf> },
  /// Replace issue URLs with inline tags
  Tags { file: Option<PathBuf> },
  /// Render every block and inline tag of a note
  Note { file: Option<PathBuf> },
}

fn read_input(file: Option<&Path>) -> Result<String> {
  match file {
    Some(path) => std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e)),
    None => {
      let mut input = String::new();
      std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| eyre!("Failed to read stdin: {}", e))?;
      Ok(input)
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init()?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let app = App::new(
    config,
    args.account.as_deref(),
    args.notes.as_deref(),
    args.refresh,
  )
  .await?;

  let output = match &args.command {
    Command::Search { file } => {
      let input = read_input(file.as_deref())?;
      app.render_block(BlockKind::Search, &input).await
    }
    Command::Count { file } => {
      let input = read_input(file.as_deref())?;
      app.render_block(BlockKind::Count, &input).await
    }
    Command::Issue { file } => {
      let input = read_input(file.as_deref())?;
      app.render_block(BlockKind::Issue, &input).await
    }
    Command::Inline { file } => app.render_inline(&read_input(file.as_deref())?).await,
    Command::Tags { file } => app.rewrite_urls(&read_input(file.as_deref())?),
    Command::Note { file } => app.render_note(&read_input(file.as_deref())?).await,
  };

  println!("{}", output);
  Ok(())
}
