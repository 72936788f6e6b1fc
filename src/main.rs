use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use color_eyre::{Result, eyre::eyre};
use solve_headless::{
	PromptMode,
	automator::Delays,
	browser::{OverlayPanel, Session},
	config::{AppConfig, SettingsFlags},
	llm::{CannedResponse, ProviderClient},
	panel::TerminalPanel,
	runner::{self, CycleOptions},
	snapshot::HtmlPage,
};
use tracing_subscriber::EnvFilter;
use v_utils::log;

#[derive(Parser)]
#[command(name = "solve_headless")]
#[command(about = "Solve the coding problem open in a browser tab and drive its editor", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Command,
	#[command(flatten)]
	settings: SettingsFlags,
}

#[derive(Subcommand)]
enum Command {
	/// Run one cycle on the page right away
	Solve(PageArgs),
	/// Keep the page open and run a cycle on every chord press, until Ctrl+C
	Watch(PageArgs),
	/// Dry-run the heuristics against a saved page
	Replay {
		/// Saved page HTML
		page: PathBuf,
		/// File holding a model response; runs a full cycle against it
		#[arg(short, long)]
		response: Option<PathBuf>,
		/// Use the explain-then-solve prompt
		#[arg(long)]
		review: bool,
	},
}

#[derive(Args)]
struct PageArgs {
	/// URL to open (in a new tab when attaching)
	url: Option<String>,
	/// DevTools endpoint of an already running browser, e.g. http://127.0.0.1:9222
	#[arg(short, long)]
	attach: Option<String>,
	/// Use the explain-then-solve prompt
	#[arg(long)]
	review: bool,
}

fn mode(review: bool) -> PromptMode {
	if review { PromptMode::Review } else { PromptMode::Solve }
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();

	let cli = Cli::parse();
	let config = AppConfig::try_build(cli.settings)?;
	let session_id = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

	match cli.command {
		Command::Solve(args) => {
			let assistant = ProviderClient::from_config(&config)?;
			log!("Using {} as the model backend", assistant.provider());
			let session = open_session(&config, &args).await?;
			let panel = OverlayPanel::new(session.page());
			let report = runner::solve_once(session.page(), &panel, &assistant, mode(args.review), &config, &session_id).await;
			if let Some(response) = &report.response {
				eprintln!("\n=== Response ===\n{response}\n");
			}

			// Leave the result on screen until the user is done with it
			if config.visible || args.attach.is_some() {
				log!("Done. Press Ctrl+C to exit...");
				tokio::signal::ctrl_c().await?;
			}
			session.close().await?;
		}
		Command::Watch(args) => {
			let assistant = ProviderClient::from_config(&config)?;
			let session = open_session(&config, &args).await?;
			runner::watch(session.page(), &assistant, mode(args.review), &config, &session_id).await?;
			session.close().await?;
		}
		Command::Replay { page, response, review } => {
			let html = std::fs::read_to_string(&page).map_err(|e| eyre!("Failed to read {}: {}", page.display(), e))?;
			let dom = HtmlPage::parse(&html);
			println!("{}", runner::inspect(&dom).await?);

			if let Some(path) = response {
				let canned = std::fs::read_to_string(&path).map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
				let options = CycleOptions {
					delays: Delays::new(Duration::ZERO, Duration::ZERO, Duration::ZERO),
					auto_run: config.auto_run,
				};
				let report = runner::run_cycle(&dom, &TerminalPanel, &CannedResponse(canned), mode(review), &options).await;
				println!("\nOutcome: {}", report.outcome);
				match dom.last_written() {
					Some(code) => println!("=== Editor contents ===\n{code}"),
					None => println!("Editor untouched"),
				}
			}
		}
	}

	Ok(())
}

async fn open_session(config: &AppConfig, args: &PageArgs) -> Result<Session> {
	if args.url.is_none() && args.attach.is_none() {
		return Err(eyre!("Nothing to open: pass a URL, or --attach to a running browser"));
	}
	Session::open(config, args.url.as_deref(), args.attach.as_deref()).await
}
