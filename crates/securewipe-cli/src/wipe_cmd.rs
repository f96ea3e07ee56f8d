use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use securewipe_core::format::format_file_size;
use securewipe_core::{
	current_platform, render_batch_report, render_file_report, render_summary,
	require_user_confirmation, AuditLog, BatchResult, CancellationFlag, CertificateAuthority,
	ExternalToolSanitizer, Platform, Validator, WipeConfig, WipeEngine, WipeMethod, WipeProgress,
};

pub enum Target {
	File(PathBuf),
	Folder(PathBuf),
	List(Vec<PathBuf>),
}

pub struct WipeOptions {
	pub target: Target,
	pub method: WipeMethod,
	pub recursive: bool,
	pub yes: bool,
	pub report: Option<PathBuf>,
	pub certificate: Option<PathBuf>,
	pub external_tool: bool,
	pub audit_dir: Option<PathBuf>,
}

/// Returns `Ok(false)` when nothing was wiped or any file failed
pub fn run(options: WipeOptions, config: WipeConfig) -> Result<bool> {
	let platform = current_platform();

	let Some(target) = validate_target(options.target, platform.as_ref(), options.recursive)? else {
		return Ok(false);
	};

	if !confirm(&target, options.method, options.yes)? {
		println!("❌ Operation cancelled");
		return Ok(false);
	}

	let cancel = CancellationFlag::new();
	let mut engine = WipeEngine::new(config.clone(), cancel).with_platform(platform.clone());

	if options.external_tool {
		let tool = ExternalToolSanitizer::new(platform.clone(), config.purge_passes);
		if !tool.is_available() {
			bail!("No secure delete tool available on {}", platform.name());
		}
		engine = engine.with_strategy(Box::new(tool));
	}

	let audit_log = match options.audit_dir.or_else(|| config.audit_dir.clone()) {
		Some(dir) => {
			let session_id = format!("wipe-{}", std::process::id());
			let log = AuditLog::new(session_id, &dir)
				.with_context(|| format!("Failed to open audit log in {}", dir.display()))?;
			println!("📝 Audit log: {}", log.log_path().display());
			Some(Arc::new(log))
		}
		None => None,
	};
	if let Some(log) = &audit_log {
		engine = engine.with_audit_log(log.clone());
	}

	let bar = progress_bar()?;
	engine.set_progress_callback({
		let bar = bar.clone();
		move |progress: WipeProgress| update_bar(&bar, &progress)
	});

	let engine = Arc::new(engine);
	ctrlc::set_handler({
		let engine = engine.clone();
		move || engine.emergency_stop()
	})
	.context("Failed to set Ctrl+C handler")?;

	println!("🔒 Wiping with {} ({})", options.method, engine.strategy_name());
	let single_file = matches!(target, Target::File(_));
	let batch = match target {
		Target::File(path) => BatchResult::from_single(engine.wipe_file(&path, options.method)),
		Target::Folder(path) => engine
			.wipe_folder(&path, options.method, options.recursive)
			.with_context(|| format!("Failed to wipe folder {}", path.display()))?,
		Target::List(paths) => engine.wipe_selection(&paths, options.method),
	};
	bar.finish_and_clear();

	if batch.was_cancelled() {
		println!("⚠️  Operation stopped by user");
	}
	println!("{}", render_summary(&batch, config.display_error_limit));

	if let Some(report_path) = &options.report {
		let text = match batch.files.first() {
			Some(result) if single_file => render_file_report(result),
			_ => render_batch_report(&batch),
		};
		std::fs::write(report_path, text)
			.with_context(|| format!("Failed to write report to {}", report_path.display()))?;
		println!("📄 Report saved: {}", report_path.display());
	}

	if let Some(certificate_path) = &options.certificate {
		issue_certificate(&batch, certificate_path, &config, audit_log)?;
	}

	Ok(batch.failed == 0 && !batch.was_cancelled() && batch.total_files > 0)
}

/// Everything here runs before any byte is overwritten
fn validate_target(target: Target, platform: &dyn Platform, recursive: bool) -> Result<Option<Target>> {
	let validator = Validator::new();
	let is_system_file = |path: &Path| platform.is_system_file(path);

	match target {
		Target::File(path) => {
			let selection = validator.validate_selection(&[path.clone()], is_system_file);
			if !selection.valid {
				print_rejections(&selection.errors, &selection.invalid_files);
				return Ok(None);
			}
			print_safety(&validator, &selection.valid_files);
			Ok(Some(Target::File(path)))
		}
		Target::Folder(path) => {
			let resolved = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
			if is_system_file(&path) || is_system_file(&resolved) {
				eprintln!("❌ {} is a protected system location", path.display());
				return Ok(None);
			}
			let validation = validator.validate_path(&path);
			if !validation.valid {
				for error in &validation.errors {
					eprintln!("❌ {}: {}", path.display(), error);
				}
				return Ok(None);
			}
			if !path.is_dir() {
				eprintln!("❌ {} is not a folder", path.display());
				return Ok(None);
			}
			println!(
				"📁 Folder: {}{}",
				path.display(),
				if recursive { " (recursive)" } else { "" }
			);
			Ok(Some(Target::Folder(path)))
		}
		Target::List(paths) => {
			let selection = validator.validate_selection(&paths, is_system_file);
			if !selection.system_files.is_empty() || selection.valid_files.is_empty() {
				print_rejections(&selection.errors, &selection.invalid_files);
				return Ok(None);
			}
			for invalid in &selection.invalid_files {
				println!(
					"⚠️  Skipping {}: {}",
					invalid.path.display(),
					invalid.reasons.join(", ")
				);
			}
			print_safety(&validator, &selection.valid_files);
			Ok(Some(Target::List(selection.valid_files)))
		}
	}
}

fn print_rejections(errors: &[String], invalid: &[securewipe_core::validation::InvalidPath]) {
	for error in errors {
		eprintln!("❌ {}", error);
	}
	for entry in invalid {
		eprintln!("   {}: {}", entry.path.display(), entry.reasons.join(", "));
	}
}

fn print_safety(validator: &Validator, paths: &[PathBuf]) {
	let report = validator.validate_file_list_safety(paths);
	println!(
		"📊 {} file(s), {} total",
		report.statistics.total_files,
		format_file_size(report.statistics.total_size)
	);
	for warning in &report.warnings {
		println!("⚠️  {}", warning);
	}
	for warning in &report.critical_warnings {
		println!("🚨 {}", warning);
	}
	if require_user_confirmation(paths) {
		println!("⚠️  Large selection: double-check before confirming");
	}
}

fn confirm(target: &Target, method: WipeMethod, yes: bool) -> Result<bool> {
	if yes {
		return Ok(true);
	}
	if !atty::is(atty::Stream::Stdin) {
		eprintln!("❌ Refusing to wipe without confirmation on non-interactive input (use --yes)");
		return Ok(false);
	}

	let what = match target {
		Target::File(path) => path.display().to_string(),
		Target::Folder(path) => format!("every file in {}", path.display()),
		Target::List(paths) => format!("{} files", paths.len()),
	};
	println!();
	println!("⚠️  This will PERMANENTLY destroy {} using {}.", what, method);
	print!("Type 'yes' to continue: ");
	io::stdout().flush()?;

	let mut answer = String::new();
	io::stdin().lock().read_line(&mut answer)?;
	Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn progress_bar() -> Result<ProgressBar> {
	let bar = ProgressBar::new(100);
	bar.set_style(
		ProgressStyle::default_bar()
			.template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}% ({eta})")
			.context("Invalid progress template")?
			.progress_chars("#>-"),
	);
	Ok(bar)
}

fn update_bar(bar: &ProgressBar, progress: &WipeProgress) {
	bar.set_position(progress.percent.round() as u64);
	if let Some(file) = &progress.current_file {
		let name = file
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| file.display().to_string());
		bar.set_message(format!(
			"[{}/{}] {} {}",
			(progress.files_completed + 1).min(progress.total_files),
			progress.total_files,
			progress.state,
			name
		));
	}
}

/// Key generation failure only costs the certificate, never the wipe result
fn issue_certificate(
	batch: &BatchResult,
	path: &Path,
	config: &WipeConfig,
	audit_log: Option<Arc<AuditLog>>,
) -> Result<()> {
	let authority = match CertificateAuthority::generate() {
		Ok(authority) => authority.with_file_limit(config.certificate_file_limit),
		Err(e) => {
			eprintln!("⚠️  Certificate not issued: {}", e);
			return Ok(());
		}
	};
	let authority = match audit_log {
		Some(log) => authority.with_audit_log(log),
		None => authority,
	};

	let certificate = authority
		.generate_wipe_certificate(batch)
		.context("Failed to sign wipe certificate")?;
	certificate
		.save(path)
		.with_context(|| format!("Failed to save certificate to {}", path.display()))?;

	println!("🔏 Certificate {} saved: {}", certificate.certificate_id, path.display());
	Ok(())
}
