use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use securewipe_core::{method_info, WipeConfig, WipeMethod};

mod verify_cmd;
mod wipe_cmd;

#[derive(Parser, Debug)]
#[command(name = "securewipe", version, about = "SecureWipe CLI - NIST SP 800-88 File Sanitization")]
struct Cli {
	/// JSON configuration file (block size, purge passes, verification mode...)
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Securely wipe a file, a folder or a list of files
	#[command(group(ArgGroup::new("target").required(true).args(["file", "folder", "list"])))]
	Wipe {
		/// Single file to wipe
		#[arg(long)]
		file: Option<PathBuf>,
		/// Folder whose files are wiped
		#[arg(long)]
		folder: Option<PathBuf>,
		/// Text file with one path per line
		#[arg(long)]
		list: Option<PathBuf>,
		/// Sanitization method
		#[arg(long, value_parser = ["clear", "purge"], default_value = "purge")]
		method: String,
		/// Descend into subfolders (with --folder)
		#[arg(long)]
		recursive: bool,
		/// Skip the interactive confirmation
		#[arg(long, short = 'y')]
		yes: bool,
		/// Write a text report to this path
		#[arg(long)]
		report: Option<PathBuf>,
		/// Issue a signed wipe certificate to this path
		#[arg(long)]
		certificate: Option<PathBuf>,
		/// Use the platform's secure-delete tool (shred/srm) instead of the built-in overwrite
		#[arg(long)]
		external_tool: bool,
		/// Write a JSONL audit trail into this directory
		#[arg(long)]
		audit_dir: Option<PathBuf>,
	},
	/// Check whether paths can be wiped, without touching them
	#[command(group(ArgGroup::new("target").required(true).args(["path", "list"])))]
	Verify {
		/// Path to check
		#[arg(long)]
		path: Option<PathBuf>,
		/// Text file with one path per line
		#[arg(long)]
		list: Option<PathBuf>,
		/// Show platform file attributes and the raw validation record
		#[arg(long)]
		detailed: bool,
	},
	/// Verify the signature of a wipe certificate
	VerifyCertificate {
		/// Certificate JSON file
		certificate: PathBuf,
	},
	/// Describe the available sanitization methods
	Methods {
		/// Print as JSON
		#[arg(long)]
		json: bool,
	},
}

fn main() -> Result<()> {
	// Logs go to stderr so they do not tear the progress bar
	tracing_subscriber::fmt().with_writer(std::io::stderr).init();

	let cli = Cli::parse();
	let config = load_config(cli.config.as_deref())?;

	let success = match cli.command {
		Commands::Wipe {
			file,
			folder,
			list,
			method,
			recursive,
			yes,
			report,
			certificate,
			external_tool,
			audit_dir,
		} => {
			let method: WipeMethod = method.parse().map_err(anyhow::Error::msg)?;
			let target = match (file, folder, list) {
				(Some(file), _, _) => wipe_cmd::Target::File(file),
				(_, Some(folder), _) => wipe_cmd::Target::Folder(folder),
				(_, _, Some(list)) => wipe_cmd::Target::List(read_path_list(&list)?),
				_ => unreachable!(),
			};
			wipe_cmd::run(
				wipe_cmd::WipeOptions {
					target,
					method,
					recursive,
					yes,
					report,
					certificate,
					external_tool,
					audit_dir,
				},
				config,
			)?
		}
		Commands::Verify { path, list, detailed } => match (path, list) {
			(Some(path), _) => verify_cmd::verify_path(&path, detailed),
			(_, Some(list)) => verify_cmd::verify_list(&read_path_list(&list)?),
			_ => unreachable!(),
		},
		Commands::VerifyCertificate { certificate } => verify_cmd::verify_certificate(&certificate)?,
		Commands::Methods { json } => {
			print_methods(&config, json)?;
			true
		}
	};

	if !success {
		std::process::exit(1);
	}
	Ok(())
}

fn load_config(path: Option<&Path>) -> Result<WipeConfig> {
	match path {
		Some(path) => WipeConfig::load(path)
			.with_context(|| format!("Failed to load config from {}", path.display())),
		None => Ok(WipeConfig::default()),
	}
}

/// One path per line; blank lines and `#` comments are ignored
fn read_path_list(list: &Path) -> Result<Vec<PathBuf>> {
	let content = std::fs::read_to_string(list)
		.with_context(|| format!("Failed to read path list {}", list.display()))?;
	Ok(content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.map(PathBuf::from)
		.collect())
}

fn print_methods(config: &WipeConfig, json: bool) -> Result<()> {
	let methods = [
		method_info(WipeMethod::Clear, config.purge_passes),
		method_info(WipeMethod::Purge, config.purge_passes),
	];

	if json {
		println!("{}", serde_json::to_string_pretty(&methods)?);
		return Ok(());
	}

	for (method, info) in [WipeMethod::Clear, WipeMethod::Purge].iter().zip(&methods) {
		println!("🧹 {} ({})", info.name, method);
		println!("   {}", info.description);
		println!("   Passes: {}", info.passes);
		println!("   Security: {}", info.security_level);
		println!("   Speed: {}", info.speed);
		println!("   Use case: {}", info.use_case);
		println!();
	}
	Ok(())
}
