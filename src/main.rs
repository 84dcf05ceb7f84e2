use anyhow::Result;
use clap::Parser;
use ghrn::commands::{self, Options};
use ghrn::model::WatchLevel;
use ghrn::runtime::RealRuntime;
use std::path::PathBuf;
use std::sync::Arc;

/// ghrn - GitHub Release Notifier
///
/// Watch GitHub repositories and get told when they publish a new release.
///
/// Releases are read from the GitHub API, falling back to the public release
/// feed when the API is unavailable. Run `ghrn authorize` with GITHUB_TOKEN
/// set to raise the API rate limit.
///
/// Examples:
///   ghrn watch owner/repo --level minor
///   ghrn daemon
#[derive(Parser, Debug)]
#[command(author, version = env!("GHRN_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (defaults to ~/.ghrn; also via GHRN_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "GHRN_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// GitHub web URL used for release feeds (defaults to https://github.com)
    #[arg(long = "web-url", value_name = "URL", global = true)]
    pub web_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start watching a repository, or change its watch level
    Watch(WatchArgs),

    /// Stop watching a repository
    Unwatch(UnwatchArgs),

    /// List watched repositories and their latest release
    List,

    /// Check every watched repository now
    Check,

    /// Show the check schedule and API rate limit
    Status,

    /// Set the check period in minutes
    Period(PeriodArgs),

    /// Save the token from GITHUB_TOKEN for API requests
    Authorize,

    /// Check on schedule until interrupted
    Daemon,
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// The GitHub repository in the format "owner/repo"
    #[arg(value_name = "OWNER/REPO")]
    pub repo: String,

    /// Which version changes to be notified about
    #[arg(long, short = 'l', value_enum, default_value_t = LevelArg::All)]
    pub level: LevelArg,
}

#[derive(clap::Args, Debug)]
pub struct UnwatchArgs {
    /// The GitHub repository in the format "owner/repo"
    #[arg(value_name = "OWNER/REPO", required_unless_present = "all")]
    pub repo: Option<String>,

    /// Stop watching every repository
    #[arg(long, conflicts_with = "repo")]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct PeriodArgs {
    #[arg(value_name = "MINUTES")]
    pub minutes: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelArg {
    /// Stop watching, same as `unwatch`
    None,
    /// Major version bumps only
    Major,
    /// Major and minor version bumps
    Minor,
    /// Every new release
    All,
}

impl From<LevelArg> for WatchLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::None => WatchLevel::None,
            LevelArg::Major => WatchLevel::Major,
            LevelArg::Minor => WatchLevel::Minor,
            LevelArg::All => WatchLevel::All,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let app = commands::open(
        Arc::new(RealRuntime),
        Options {
            root: cli.root,
            api_url: cli.api_url,
            web_url: cli.web_url,
        },
    )
    .await?;

    match cli.command {
        Commands::Watch(args) => commands::watch(&app, &args.repo, args.level.into()).await?,
        Commands::Unwatch(args) => match args.repo {
            Some(repo) => commands::unwatch(&app, &repo).await?,
            None => commands::unwatch_all(&app).await?,
        },
        Commands::List => commands::list(&app).await?,
        Commands::Check => commands::check(&app).await?,
        Commands::Status => commands::status(&app).await?,
        Commands::Period(args) => commands::period(&app, args.minutes).await?,
        Commands::Authorize => commands::authorize(&app).await?,
        Commands::Daemon => commands::daemon(&app).await?,
    }
    Ok(())
}
