//! Upload staging and content hashing.
//!
//! Uploads land in a per-job path under the upload area,
//! `<upload_dir>/<job-id>_<safe-basename>`, with the matching output path
//! reserved as `<output_dir>/<job-id>_sanitized.pdf`. Everything staged
//! here is transient: the controller removes both files at job end, and
//! the sweeper reaps anything a crashed task left behind.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::job::JobId;

/// Upload size ceiling: 100 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Extensions the gateway accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "odt", "jpg", "jpeg", "png",
];

/// Block size for digest computation.
const HASH_BLOCK_BYTES: usize = 8 * 1024;

/// Reduce an arbitrary client-supplied filename to a safe basename.
///
/// Path components are dropped, anything outside `[A-Za-z0-9._-]` becomes
/// an underscore, and leading dots are stripped so the result can never
/// traverse or hide. An empty result falls back to `"upload"`.
pub fn safe_basename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let unsafe_chars = regex::Regex::new(r"[^A-Za-z0-9._-]").unwrap();
    let cleaned = unsafe_chars.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lowercased extension of a filename, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Whether the (lowercase) extension is in the accepted set.
pub fn is_allowed_extension(extension: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&extension)
}

/// SHA-256 of a file, read in bounded blocks, as lowercase hex.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut block = [0u8; HASH_BLOCK_BYTES];
    loop {
        let n = file.read(&mut block).await?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A staged upload: validated, written, hashed.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    /// Sanitized basename of the original file.
    pub original_name: String,
    /// Lowercase extension.
    pub extension: String,
    /// Where the input landed.
    pub input_path: PathBuf,
    /// SHA-256 of the staged bytes.
    pub digest: String,
    /// Staged size in bytes.
    pub size: u64,
}

/// The process-wide upload and output areas.
#[derive(Debug, Clone)]
pub struct StagingArea {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl StagingArea {
    /// Bind to the given areas (created on demand by [`Self::ensure_dirs`]).
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Create both areas if absent.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// The upload area.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// The output area.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Validate and stage an upload for `job_id`.
    ///
    /// Rejections (bad extension, oversize) happen before any byte is
    /// written: a rejected upload leaves no staging file behind.
    pub async fn stage(
        &self,
        job_id: &JobId,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StagedUpload> {
        let safe_name = safe_basename(original_name);
        let extension = extension_of(&safe_name)
            .filter(|e| is_allowed_extension(e))
            .ok_or_else(|| GatewayError::InvalidInput("Invalid file type".into()))?;

        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(GatewayError::InvalidInput(
                "File size exceeds 100MB limit".into(),
            ));
        }

        let input_path = self.upload_dir.join(format!("{job_id}_{safe_name}"));
        tokio::fs::write(&input_path, bytes).await?;

        let digest = match sha256_file(&input_path).await {
            Ok(digest) => digest,
            Err(e) => {
                // Half-staged artifacts must not linger.
                let _ = tokio::fs::remove_file(&input_path).await;
                return Err(e.into());
            }
        };

        debug!(job = %job_id, path = %input_path.display(), %digest, "upload staged");
        Ok(StagedUpload {
            original_name: safe_name,
            extension,
            input_path,
            digest,
            size: bytes.len() as u64,
        })
    }

    /// The reserved output path for `job_id`.
    pub fn output_path_for(&self, job_id: &JobId) -> PathBuf {
        self.output_dir.join(format!("{job_id}_sanitized.pdf"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_basename_strips_path_components() {
        assert_eq!(safe_basename("../../etc/passwd"), "passwd");
        assert_eq!(safe_basename(r"C:\Users\mallory\doc.pdf"), "doc.pdf");
        assert_eq!(safe_basename("/tmp/evil.pdf"), "evil.pdf");
    }

    #[test]
    fn test_safe_basename_replaces_nonportable_characters() {
        assert_eq!(safe_basename("my report (final).pdf"), "my_report__final_.pdf");
        assert_eq!(safe_basename("résumé.pdf"), "r_sum_.pdf");
    }

    #[test]
    fn test_safe_basename_strips_leading_dots() {
        assert_eq!(safe_basename(".hidden.pdf"), "hidden.pdf");
        assert_eq!(safe_basename("..."), "upload");
    }

    #[test]
    fn test_safe_basename_never_empty() {
        assert_eq!(safe_basename(""), "upload");
        assert_eq!(safe_basename("///"), "upload");
    }

    #[test]
    fn test_extension_gate() {
        assert!(is_allowed_extension("pdf"));
        assert!(is_allowed_extension("docx"));
        assert!(is_allowed_extension("png"));
        assert!(!is_allowed_extension("exe"));
        assert!(!is_allowed_extension("html"));
        assert_eq!(extension_of("A.PDF"), Some("pdf".into()));
        assert_eq!(extension_of("noext"), None);
    }

    #[tokio::test]
    async fn test_digest_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        tokio::fs::write(&path, b"flatpress digest sample")
            .await
            .unwrap();

        let first = sha256_file(&path).await.unwrap();
        let second = sha256_file(&path).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[tokio::test]
    async fn test_digest_matches_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();

        assert_eq!(
            sha256_file(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_stage_rejects_bad_extension_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().join("up"), dir.path().join("out"));
        area.ensure_dirs().await.unwrap();

        let id = JobId::new();
        let result = area.stage(&id, "payload.exe", b"MZ").await;
        assert!(matches!(result, Err(GatewayError::InvalidInput(_))));
        assert_eq!(std::fs::read_dir(area.upload_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stage_rejects_oversize_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().join("up"), dir.path().join("out"));
        area.ensure_dirs().await.unwrap();

        let oversize = vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize];
        let result = area.stage(&JobId::new(), "big.pdf", &oversize).await;
        match result {
            Err(GatewayError::InvalidInput(msg)) => {
                assert_eq!(msg, "File size exceeds 100MB limit");
            }
            other => panic!("expected size rejection, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(area.upload_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stage_accepts_exactly_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().join("up"), dir.path().join("out"));
        area.ensure_dirs().await.unwrap();

        let at_limit = vec![0u8; MAX_UPLOAD_BYTES as usize];
        let staged = area.stage(&JobId::new(), "big.pdf", &at_limit).await.unwrap();
        assert_eq!(staged.size, MAX_UPLOAD_BYTES);
        assert!(staged.input_path.exists());
    }

    #[tokio::test]
    async fn test_staged_layout() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().join("up"), dir.path().join("out"));
        area.ensure_dirs().await.unwrap();

        let id = JobId::new();
        let staged = area.stage(&id, "quarterly report.docx", b"PK").await.unwrap();

        let expected_name = format!("{id}_quarterly_report.docx");
        assert!(staged.input_path.ends_with(&expected_name));
        assert_eq!(staged.extension, "docx");
        assert!(area
            .output_path_for(&id)
            .ends_with(format!("{id}_sanitized.pdf")));
    }
}
