//! Secure file sanitization per NIST SP 800-88 Clear/Purge, with signed
//! proof of deletion.
//!
//! ```no_run
//! use securewipe_core::{CancellationFlag, CertificateAuthority, WipeConfig, WipeEngine, WipeMethod};
//! use std::path::Path;
//!
//! let engine = WipeEngine::new(WipeConfig::default(), CancellationFlag::new());
//! let batch = engine.wipe_folder(Path::new("/tmp/secrets"), WipeMethod::Purge, true)?;
//!
//! let authority = CertificateAuthority::generate()?;
//! let certificate = authority.generate_wipe_certificate(&batch)?;
//! certificate.save("certificate.json")?;
//! # Ok::<(), securewipe_core::WipeError>(())
//! ```

pub mod audit;
pub mod cancel;
pub mod certificate;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod platform;
pub mod report;
pub mod sanitize;
pub mod validation;

pub use audit::{AuditEvent, AuditEventType, AuditLog, AuditLogger, AuditSeverity};
pub use cancel::CancellationFlag;
pub use certificate::{
    verify_certificate_file, verify_certificate_json, Certificate, CertificateAuthority,
};
pub use config::{VerificationMode, WipeConfig};
pub use engine::{BatchResult, EngineStatus, WipeEngine, WipeProgress, WipeResult, WipeState};
pub use error::{ErrorKind, Result, WipeError};
pub use platform::{current_platform, Platform};
pub use report::{render_batch_report, render_file_report, render_summary};
pub use sanitize::{
    method_info, verify_wipe, ExternalToolSanitizer, MethodInfo, NistSanitizer, SecureDelete,
    WipeMethod,
};
pub use validation::{require_user_confirmation, Validator};
