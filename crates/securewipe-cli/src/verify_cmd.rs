use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use securewipe_core::certificate::check_certificate_json;
use securewipe_core::format::format_file_size;
use securewipe_core::{current_platform, Validator};
use serde_json::Value;

/// Report whether one path could be wiped
pub fn verify_path(path: &Path, detailed: bool) -> bool {
	let platform = current_platform();
	let validator = Validator::new();

	println!("🔍 Checking: {}", path.display());

	let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
	let is_system = platform.is_system_file(path) || platform.is_system_file(&resolved);
	let validation = validator.validate_path(path);
	let permissions = validator.validate_permissions(path);

	println!("   Exists: {}", yes_no(validation.exists));
	if let Some(path_type) = &validation.path_type {
		println!("   Type: {:?}", path_type);
	}
	println!("   Readable: {}", yes_no(permissions.readable));
	println!("   Writable: {}", yes_no(permissions.writable));
	println!("   Parent writable: {}", yes_no(permissions.parent_writable));
	println!("   System file: {}", yes_no(is_system));

	for error in validation.errors.iter().chain(&permissions.errors) {
		println!("   ⚠️  {}", error);
	}

	if detailed {
		if let Some(attributes) = platform.file_attributes(path) {
			println!();
			println!("📋 Attributes ({}):", platform.name());
			println!("   Size: {}", format_file_size(attributes.size));
			println!("   Read-only: {}", yes_no(attributes.readonly));
			if let Some(permissions) = &attributes.permissions {
				println!("   Permissions: {}", permissions);
			}
			if let (Some(uid), Some(gid)) = (attributes.uid, attributes.gid) {
				println!("   Owner: {}:{}", uid, gid);
			}
			if let Some(nlink) = attributes.nlink {
				println!("   Links: {}", nlink);
			}
		}
		if let Ok(json) = serde_json::to_string_pretty(&validation) {
			println!();
			println!("{}", json);
		}
	}

	let wipeable = validation.valid && permissions.can_delete && !is_system;
	println!();
	if wipeable {
		println!("✅ Can be securely wiped");
	} else {
		println!("❌ Cannot be wiped");
	}
	wipeable
}

/// Validate a selection the same way `wipe --list` would
pub fn verify_list(paths: &[PathBuf]) -> bool {
	let platform = current_platform();
	let validator = Validator::new();
	let selection = validator.validate_selection(paths, |p| platform.is_system_file(p));

	println!("🔍 Checked {} path(s)", selection.total_files);
	println!("   Valid: {}", selection.valid_files.len());
	println!("   Invalid: {}", selection.invalid_files.len());
	println!("   System files: {}", selection.system_files.len());

	for invalid in &selection.invalid_files {
		println!("   ❌ {}: {}", invalid.path.display(), invalid.reasons.join(", "));
	}
	for warning in &selection.warnings {
		println!("   ⚠️  {}", warning);
	}
	for error in &selection.errors {
		println!("   ❌ {}", error);
	}

	let safety = validator.validate_file_list_safety(&selection.valid_files);
	println!("   Total size: {}", format_file_size(safety.statistics.total_size));
	for warning in safety.warnings.iter().chain(&safety.critical_warnings) {
		println!("   ⚠️  {}", warning);
	}

	println!();
	if selection.valid {
		println!("✅ Selection can be securely wiped");
	} else {
		println!("❌ Selection cannot be wiped as-is");
	}
	selection.valid
}

/// Unreadable files are an error; a bad signature is a `false`
pub fn verify_certificate(path: &Path) -> Result<bool> {
	let json = std::fs::read_to_string(path)
		.with_context(|| format!("Failed to read certificate {}", path.display()))?;
	let value: Value = serde_json::from_str(&json)
		.with_context(|| format!("{} is not valid JSON", path.display()))?;

	println!("🔏 Certificate: {}", value["certificate_id"].as_str().unwrap_or("<missing>"));
	if let Some(timestamp) = value["timestamp"].as_str() {
		println!("   Issued: {}", timestamp);
	}
	if let Some(method) = value["operation"]["method"].as_str() {
		println!("   Method: {}", method);
	}
	let results = &value["results"];
	if results.is_object() {
		println!(
			"   Files: {} total, {} successful, {} failed, {} skipped",
			results["total_files"], results["successful"], results["failed"], results["skipped"]
		);
	}

	match check_certificate_json(&value) {
		Ok(()) => {
			println!("✅ Signature valid");
			Ok(true)
		}
		Err(e) => {
			println!("❌ Certificate INVALID: {}", e);
			Ok(false)
		}
	}
}

fn yes_no(value: bool) -> &'static str {
	if value {
		"yes"
	} else {
		"no"
	}
}
