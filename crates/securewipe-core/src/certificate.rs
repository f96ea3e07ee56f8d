//! Signed wipe certificates
//!
//! A certificate is a JSON record of a finished batch, signed with RSA-PSS
//! (SHA-256) over a canonical serialization of every field except
//! `signature` and `public_key`. The canonical form is compact JSON with
//! object keys sorted at every level, so verification does not depend on
//! how the file was formatted or in which order its fields appear.
//!
//! At most `file_limit` entries are embedded. The `file_manifest` carries the
//! SHA-256 of the canonical list of *all* entries, so files beyond the cap
//! are still bound by the signature.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use crate::audit::{AuditLog, AuditLogger};
use crate::config::DEFAULT_CERTIFICATE_FILE_LIMIT;
use crate::engine::BatchResult;
use crate::error::{Result, WipeError};
use crate::sanitize::WipeMethod;

pub const DEFAULT_KEY_BITS: usize = 2048;

pub const COMPLIANCE_STANDARD: &str = "NIST SP 800-88";

/// Fields excluded from the signed payload
const UNSIGNED_FIELDS: [&str; 2] = ["signature", "public_key"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationSummary {
    pub method: WipeMethod,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceInfo {
    pub standard: String,
    pub method_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertifiedFile {
    pub path: String,
    pub success: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileManifest {
    pub total_entries: usize,
    pub included_entries: usize,
    pub truncated: bool,
    /// SHA-256 (hex) of the canonical JSON array of every entry
    pub digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Certificate {
    pub certificate_id: String,
    pub timestamp: DateTime<Utc>,
    pub operation: OperationSummary,
    pub results: ResultSummary,
    pub compliance: ComplianceInfo,
    pub files: Vec<CertifiedFile>,
    pub file_manifest: FileManifest,
    /// Hex-encoded RSA-PSS signature
    pub signature: String,
    /// SPKI PEM of the signing key
    #[serde(rename = "public_key")]
    pub public_key_pem: String,
}

impl Certificate {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| WipeError::io(path, e))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| WipeError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Holds the process-lifetime signing keypair and issues certificates
pub struct CertificateAuthority {
    private_key: RsaPrivateKey,
    signing_key: BlindedSigningKey<Sha256>,
    public_key_pem: String,
    file_limit: usize,
    audit: Option<AuditLogger>,
}

impl CertificateAuthority {
    /// Generate a fresh 2048-bit keypair.
    ///
    /// Failure means certificates cannot be issued; wiping does not depend
    /// on this and should carry on without one.
    pub fn generate() -> Result<Self> {
        Self::generate_with_bits(DEFAULT_KEY_BITS)
    }

    pub fn generate_with_bits(bits: usize) -> Result<Self> {
        tracing::info!("Generating {}-bit RSA signing key", bits);
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| WipeError::CertificateKeyUnavailable(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Load a PKCS#8 PEM key previously written by [`export_keys`](Self::export_keys)
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| WipeError::CertificateKeyUnavailable(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self> {
        let public_key_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| WipeError::CertificateKeyUnavailable(e.to_string()))?;

        Ok(Self {
            signing_key: BlindedSigningKey::<Sha256>::new(private_key.clone()),
            private_key,
            public_key_pem,
            file_limit: DEFAULT_CERTIFICATE_FILE_LIMIT,
            audit: None,
        })
    }

    pub fn with_file_limit(mut self, limit: usize) -> Self {
        self.file_limit = limit;
        self
    }

    pub fn with_audit_log(mut self, log: Arc<AuditLog>) -> Self {
        self.audit = Some(AuditLogger::new(log));
        self
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// RSA-PSS/SHA-256 signature over `data`. Probabilistic: two calls on
    /// the same data yield different, equally valid signatures.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign_with_rng(&mut OsRng, data)
            .map_err(|e| WipeError::CertificateKeyUnavailable(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Build and sign a certificate for a finished batch
    pub fn generate_wipe_certificate(&self, batch: &BatchResult) -> Result<Certificate> {
        let timestamp = Utc::now();

        let entries: Vec<CertifiedFile> = batch
            .files
            .iter()
            .map(|f| CertifiedFile {
                path: f.path.display().to_string(),
                success: f.success,
                verified: f.verified,
            })
            .collect();

        let file_manifest = FileManifest {
            total_entries: entries.len(),
            included_entries: entries.len().min(self.file_limit),
            truncated: entries.len() > self.file_limit,
            digest: manifest_digest(&serde_json::to_value(&entries)?),
        };
        if file_manifest.truncated {
            tracing::warn!(
                "Certificate embeds {} of {} file entries; the rest are bound by the manifest digest",
                file_manifest.included_entries,
                file_manifest.total_entries
            );
        }

        let mut certificate = Certificate {
            certificate_id: certificate_id(&timestamp),
            timestamp,
            operation: OperationSummary {
                method: batch.method,
                start_time: batch.start_time,
                end_time: batch.end_time,
                duration_secs: batch.duration_secs,
            },
            results: ResultSummary {
                total_files: batch.total_files,
                successful: batch.successful,
                failed: batch.failed,
                skipped: batch.skipped,
            },
            compliance: ComplianceInfo {
                standard: COMPLIANCE_STANDARD.to_string(),
                method_description: method_description(batch.method).to_string(),
            },
            files: entries.into_iter().take(self.file_limit).collect(),
            file_manifest,
            signature: String::new(),
            public_key_pem: String::new(),
        };

        let payload = signing_payload(&serde_json::to_value(&certificate)?)?;
        certificate.signature = hex::encode(self.sign(payload.as_bytes())?);
        certificate.public_key_pem = self.public_key_pem.clone();

        tracing::info!("Wipe certificate issued: {}", certificate.certificate_id);
        if let Some(audit) = &self.audit {
            audit.certificate_issued(&certificate.certificate_id, batch.total_files);
        }
        Ok(certificate)
    }

    /// Check a certificate against its embedded public key
    pub fn verify_certificate(&self, certificate: &Certificate) -> bool {
        let valid = match serde_json::to_value(certificate) {
            Ok(value) => verify_certificate_json(&value),
            Err(e) => {
                tracing::warn!("Certificate could not be serialized: {}", e);
                false
            }
        };

        if let Some(audit) = &self.audit {
            audit.certificate_verified(&certificate.certificate_id, valid);
        }
        valid
    }

    /// Write `private_key.pem` (PKCS#8) and `public_key.pem` (SPKI) to `dir`
    pub fn export_keys(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| WipeError::io(dir, e))?;

        let private_pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| WipeError::CertificateKeyUnavailable(e.to_string()))?;

        let private_path = dir.join("private_key.pem");
        std::fs::write(&private_path, private_pem.as_bytes())
            .map_err(|e| WipeError::io(&private_path, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&private_path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| WipeError::io(&private_path, e))?;
        }

        let public_path = dir.join("public_key.pem");
        std::fs::write(&public_path, &self.public_key_pem)
            .map_err(|e| WipeError::io(&public_path, e))?;

        tracing::info!("Keys exported to {}", dir.display());
        Ok(())
    }
}

/// Verify `signature` over `data` with an SPKI PEM public key.
/// Any malformed input yields `false`.
pub fn verify(data: &[u8], signature: &[u8], public_key_pem: &str) -> bool {
    let Ok(public_key) = RsaPublicKey::from_public_key_pem(public_key_pem) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public_key)
        .verify(data, &signature)
        .is_ok()
}

/// Verify a certificate in raw JSON form, reporting why it is rejected
pub fn check_certificate_json(value: &Value) -> Result<()> {
    let object = value
        .as_object()
        .ok_or_else(|| WipeError::SignatureInvalid("certificate is not a JSON object".into()))?;

    let signature_hex = non_empty_str(object, "signature")
        .ok_or_else(|| WipeError::SignatureInvalid("missing signature".into()))?;
    let public_key_pem = non_empty_str(object, "public_key")
        .ok_or_else(|| WipeError::SignatureInvalid("missing public key".into()))?;
    let signature = hex::decode(signature_hex)
        .map_err(|e| WipeError::SignatureInvalid(format!("signature is not hex: {}", e)))?;

    let payload = signing_payload(value)?;
    if !verify(payload.as_bytes(), &signature, public_key_pem) {
        return Err(WipeError::SignatureInvalid(
            "signature does not match certificate contents".into(),
        ));
    }

    check_manifest(object)
}

/// `true` only for a certificate whose signature checks out
pub fn verify_certificate_json(value: &Value) -> bool {
    match check_certificate_json(value) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Certificate rejected: {}", e);
            false
        }
    }
}

/// Load and verify a certificate file; unreadable or unparsable files are invalid
pub fn verify_certificate_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let value = std::fs::read_to_string(path)
        .map_err(|e| WipeError::io(path, e))
        .and_then(|json| Ok(serde_json::from_str::<Value>(&json)?));

    match value {
        Ok(value) => {
            let valid = verify_certificate_json(&value);
            if valid {
                tracing::info!("Certificate verified: {}", path.display());
            }
            valid
        }
        Err(e) => {
            tracing::warn!("Cannot read certificate {}: {}", path.display(), e);
            false
        }
    }
}

/// Canonical bytes that get signed: the record minus the unsigned fields
pub fn signing_payload(value: &Value) -> Result<String> {
    let mut object = value
        .as_object()
        .cloned()
        .ok_or_else(|| WipeError::SignatureInvalid("certificate is not a JSON object".into()))?;
    for field in UNSIGNED_FIELDS {
        object.remove(field);
    }
    Ok(canonical_json(&Value::Object(object)))
}

/// Compact JSON with object keys sorted at every level
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn manifest_digest(entries: &Value) -> String {
    hex::encode(Sha256::digest(canonical_json(entries).as_bytes()))
}

/// An untruncated certificate must embed exactly the entries its digest covers
fn check_manifest(object: &Map<String, Value>) -> Result<()> {
    let Some(manifest) = object.get("file_manifest") else {
        return Ok(());
    };
    let manifest: FileManifest = serde_json::from_value(manifest.clone())
        .map_err(|e| WipeError::SignatureInvalid(format!("malformed file manifest: {}", e)))?;

    let files = object.get("files").cloned().unwrap_or(Value::Array(Vec::new()));
    let embedded = files.as_array().map(Vec::len).unwrap_or(0);
    if embedded != manifest.included_entries {
        return Err(WipeError::SignatureInvalid(
            "file manifest count does not match embedded files".into(),
        ));
    }
    if !manifest.truncated && manifest_digest(&files) != manifest.digest {
        return Err(WipeError::SignatureInvalid(
            "file manifest digest does not match embedded files".into(),
        ));
    }
    Ok(())
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// First 16 hex digits (uppercase) of SHA-256 of the issue timestamp
fn certificate_id(timestamp: &DateTime<Utc>) -> String {
    let digest = Sha256::digest(timestamp.to_rfc3339().as_bytes());
    hex::encode_upper(digest)[..16].to_string()
}

fn method_description(method: WipeMethod) -> &'static str {
    match method {
        WipeMethod::Clear => "NIST Clear - Single pass overwrite with zeros",
        WipeMethod::Purge => "NIST Purge - Multi-pass overwrite (zeros, ones, random) with sampling verification",
    }
}
