use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use syncagent_core::callbacks::NoCallbacks;
use syncagent_core::config::Config;
use syncagent_core::keystore::FileKeystore;
use syncagent_core::logging;
use syncagent_core::state::LocalStateStore;
use syncagent_core::types::derive_status;
use syncagent_core::Supervisor;

fn main() -> Result<(), Box<dyn Error>> {
	logging::init_tracing();

	let matches = Command::new("agent")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Zero-knowledge, end-to-end-encrypted file synchronization agent")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.help("Path to a config.toml overlay"),
		)
		.subcommand(
			Command::new("run")
				.about("Run the sync agent until interrupted")
				.arg(Arg::new("root").long("root").value_name("DIR").help("Directory to synchronize"))
				.arg(Arg::new("server").long("server").value_name("URL").help("Central server base URL"))
				.arg(
					Arg::new("password")
						.long("password")
						.value_name("PASSWORD")
						.help("Master password (prefer SYNCAGENT_MASTER_PASSWORD)"),
				),
		)
		.subcommand(Command::new("status").about("Print derived status for every known file"))
		.subcommand(
			Command::new("init")
				.about("Initialize ~/.syncagent: agent_dir, keystore and a default config.toml")
				.arg(Arg::new("root").long("root").value_name("DIR").help("Directory to synchronize"))
				.arg(Arg::new("server").long("server").value_name("URL").help("Central server base URL"))
				.arg(
					Arg::new("password")
						.long("password")
						.value_name("PASSWORD")
						.required(true)
						.help("Master password for the new keystore"),
				),
		)
		.get_matches();

	let config_path = matches.get_one::<String>("config").map(PathBuf::from);

	match matches.subcommand() {
		Some(("run", sub)) => cmd_run(config_path, sub),
		Some(("status", _)) => cmd_status(config_path),
		Some(("init", sub)) => cmd_init(config_path, sub),
		_ => unreachable!("subcommand_required"),
	}
}

fn cmd_run(config_path: Option<PathBuf>, sub: &clap::ArgMatches) -> Result<(), Box<dyn Error>> {
	let mut config = Config::load(config_path.as_deref())?;
	if let Some(root) = sub.get_one::<String>("root") {
		config.sync_folder = PathBuf::from(root);
	}
	if let Some(server) = sub.get_one::<String>("server") {
		config.server_url = server.clone();
	}

	let password = master_password(sub)?;
	let callbacks = Arc::new(NoCallbacks);
	let supervisor = Supervisor::init(config, &password, callbacks)?;
	supervisor.run()?;
	Ok(())
}

fn cmd_status(config_path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
	let config = Config::load(config_path.as_deref())?;
	let state = LocalStateStore::open(&config.agent_dir.join("state.redb"))?;

	for record in state.iter_records()? {
		let abs_path = config.sync_folder.join(record.path.as_path());
		let disk = std::fs::metadata(&abs_path).ok().map(|meta| syncagent_core::types::OnDiskFacts {
			exists: true,
			mtime: meta
				.modified()
				.ok()
				.and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
				.map(|d| d.as_secs_f64())
				.unwrap_or(0.0),
			size: meta.len(),
		});
		let status = derive_status(Some(&record), disk);
		println!("{}\t{}", status, record.path);
	}

	Ok(())
}

fn cmd_init(config_path: Option<PathBuf>, sub: &clap::ArgMatches) -> Result<(), Box<dyn Error>> {
	let mut config = Config::default();
	if let Some(root) = sub.get_one::<String>("root") {
		config.sync_folder = PathBuf::from(root);
	}
	if let Some(server) = sub.get_one::<String>("server") {
		config.server_url = server.clone();
	}
	let password = sub.get_one::<String>("password").expect("required").clone();

	std::fs::create_dir_all(&config.agent_dir)?;
	FileKeystore::init(&config.agent_dir, &password)?;

	let toml_path = config_path.unwrap_or_else(|| config.agent_dir.join("config.toml"));
	let text = toml::to_string_pretty(&config)?;
	std::fs::write(&toml_path, text)?;

	println!("Initialized agent directory at {}", config.agent_dir.display());
	println!("Wrote config to {}", toml_path.display());
	Ok(())
}

/// Master password comes from `--password`, then `SYNCAGENT_MASTER_PASSWORD`,
/// then an interactive prompt — never logged, never left in shell history
/// by default.
fn master_password(sub: &clap::ArgMatches) -> Result<String, Box<dyn Error>> {
	if let Some(p) = sub.get_one::<String>("password") {
		return Ok(p.clone());
	}
	if let Ok(p) = std::env::var("SYNCAGENT_MASTER_PASSWORD") {
		return Ok(p);
	}
	print!("Master password: ");
	std::io::stdout().flush()?;
	let mut input = String::new();
	std::io::stdin().read_line(&mut input)?;
	Ok(input.trim_end_matches(['\n', '\r']).to_string())
}

// vim: ts=4
