mod tools;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use deebot_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Path of the YAML configuration file
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Run the robot integration daemon
	Run,

	/// One-shot dump of the robot's map id, rooms and status
	Probe,
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = match &cli.config {
		Some(path) => Config::from_path(path).with_context(|| format!("loading {}", path.display()))?,
		None => Config::default(),
	};

	let mut logger = env_logger::Builder::new();
	logger
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp_millis();
	if config.ros_debug {
		logger.filter_module("deebot_ros", log::LevelFilter::Trace);
	}
	logger.init();

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?;
	runtime.block_on(run(&cli, config))
}

async fn run(cli: &Cli, config: Config) -> Result<()> {
	match &cli.command {
		Commands::Run => tools::run::run(config).await,
		Commands::Probe => tools::probe::run(config).await,
	}
}
