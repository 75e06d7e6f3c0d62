mod auth;
mod config;
mod context;
mod files;
mod git;
mod import;
mod jenkins;
mod prompt;
mod provider;
mod scaffold;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::auth::AuthService;
use crate::config::{Config, JenkinsSettings};
use crate::context::{DEFAULT_CREDENTIALS_ID, ImportContext};
use crate::git::Git;
use crate::import::Importer;
use crate::jenkins::JenkinsClient;
use crate::prompt::{BatchPrompter, Prompter, TerminalPrompter};
use crate::provider::DefaultProviderFactory;
use crate::scaffold::DraftScaffolder;

#[derive(Parser, Debug)]
#[command(
    name = "onboard",
    version,
    about = "Bring a project under CI",
    long_about = None
)]
struct Cli {
    /// Show debug logging
    #[arg(global = true, short, long, default_value_t = false)]
    verbose: bool,

    /// Config file with git servers, users and the Jenkins connection
    #[arg(global = true, long, env = "ONBOARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a local directory or a remote repository into Jenkins
    Import(ImportArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Directory to import, or to clone into when --url is given
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Clone this repository instead of importing a local directory
    #[arg(short, long)]
    url: Option<String>,

    /// Organisation to create a new repository in
    #[arg(short, long)]
    org: Option<String>,

    /// Name of the repository to create
    #[arg(short, long)]
    name: Option<String>,

    /// Jenkins credentials id used to check out the repository
    #[arg(short, long, default_value = DEFAULT_CREDENTIALS_ID)]
    credentials: String,

    /// Never prompt; take the default answer for every question
    #[arg(short, long = "batch-mode", default_value_t = false)]
    batch_mode: bool,

    #[arg(long, env = "ONBOARD_JENKINS_URL")]
    jenkins_url: Option<String>,

    #[arg(long, env = "ONBOARD_JENKINS_USER")]
    jenkins_user: Option<String>,

    #[arg(long, env = "ONBOARD_JENKINS_TOKEN", hide_env_values = true)]
    jenkins_token: Option<String>,

    /// Project generator to run
    #[arg(long, env = "ONBOARD_DRAFT", default_value = "draft")]
    draft: PathBuf,
}

impl ImportArgs {
    /// Flags win over the `[jenkins]` table.
    fn jenkins_settings(&self, cfg: &Config) -> JenkinsSettings {
        let mut settings = cfg.jenkins.clone().unwrap_or_default();
        if let Some(url) = &self.jenkins_url {
            settings.url = url.clone();
        }
        if let Some(user) = &self.jenkins_user {
            settings.username = Some(user.clone());
        }
        if let Some(token) = &self.jenkins_token {
            settings.api_token = Some(token.clone());
        }
        settings
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("onboard={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().or_else(config::default_config_path);
    let cfg = match &config_path {
        Some(path) => config::load_config(path).await?,
        None => Config::with_defaults(Config::default()),
    };

    match cli.command {
        Commands::Import(args) => run_import(args, cfg, config_path).await,
    }
}

async fn run_import(args: ImportArgs, cfg: Config, config_path: Option<PathBuf>) -> Result<()> {
    let jenkins = JenkinsClient::new(&args.jenkins_settings(&cfg))?;

    if args.url.is_none() && !args.dir.exists() {
        anyhow::bail!("directory {} does not exist", args.dir.display());
    }
    let dir = if args.dir.exists() {
        args.dir
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", args.dir.display()))?
    } else {
        args.dir.clone()
    };

    let mut ctx = ImportContext::new(dir).with_remote_url(args.url.clone());
    ctx.credentials_id = args.credentials.clone();
    ctx.organisation = args.org.clone();
    ctx.repository = args.name.clone();

    let prompter: Box<dyn Prompter> = if args.batch_mode {
        Box::new(BatchPrompter)
    } else {
        Box::new(TerminalPrompter)
    };
    let vcs = Git;
    let scaffolder = DraftScaffolder::new(&args.draft);
    let providers = DefaultProviderFactory;
    let mut auth = AuthService::new(cfg, config_path);

    let mut importer = Importer {
        vcs: &vcs,
        scaffolder: &scaffolder,
        prompter: prompter.as_ref(),
        providers: &providers,
        auth: &mut auth,
        build_server: &jenkins,
    };
    importer.run(&mut ctx).await?;
    tracing::debug!(dir = %ctx.dir.display(), "import finished");
    Ok(())
}
