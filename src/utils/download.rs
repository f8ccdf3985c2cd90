use anyhow::{Context, Result, bail};
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Result of downloading an image to local storage.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Full path of the stored file.
    pub file_path: PathBuf,
    /// File name only (`<uuid>.<ext>`).
    pub file_name: String,
    /// MD5 of the file content, lowercase hex.
    pub file_hash: String,
    /// Size in bytes.
    pub file_size: usize,
}

/// Download an image into `storage_dir` under a fresh UUID file name.
///
/// `max_size_mb` bounds the payload; 0 disables the limit. The extension is
/// taken from the URL when it looks like an image extension, falling back to
/// the response Content-Type, then `.jpg`.
pub async fn download_image(
    url: &str,
    storage_dir: &Path,
    max_size_mb: u64,
) -> Result<DownloadResult> {
    std::fs::create_dir_all(storage_dir)
        .with_context(|| format!("failed to create storage dir {}", storage_dir.display()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let resp = client.get(url).send().await.context("image download failed")?;
    if !resp.status().is_success() {
        bail!("image download failed: HTTP {}", resp.status());
    }

    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let bytes = resp.bytes().await.context("image download body failed")?;
    if max_size_mb > 0 && bytes.len() as u64 > max_size_mb * 1024 * 1024 {
        bail!(
            "image exceeds size limit: {} bytes > {} MB",
            bytes.len(),
            max_size_mb
        );
    }

    let ext = extension_from_url(url)
        .or_else(|| extension_from_content_type(&content_type))
        .unwrap_or(".jpg");

    let mut hasher = Md5::new();
    hasher.update(&bytes);
    let file_hash = hex_lower(&hasher.finalize());

    let file_name = format!("{}{}", Uuid::new_v4(), ext);
    let file_path = storage_dir.join(&file_name);
    std::fs::write(&file_path, &bytes)
        .with_context(|| format!("failed to write {}", file_path.display()))?;

    Ok(DownloadResult {
        file_path,
        file_name,
        file_hash,
        file_size: bytes.len(),
    })
}

/// MD5 of an existing file, lowercase hex.
pub fn file_md5(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Md5::new();
    hasher.update(&bytes);
    Ok(hex_lower(&hasher.finalize()))
}

fn hex_lower(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{:02x}", b);
    }
    out
}

fn extension_from_url(url: &str) -> Option<&'static str> {
    let path = url.split('?').next().unwrap_or(url);
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(".jpg"),
        "png" => Some(".png"),
        "gif" => Some(".gif"),
        "webp" => Some(".webp"),
        "bmp" => Some(".bmp"),
        _ => None,
    }
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    if content_type.contains("jpeg") {
        Some(".jpg")
    } else if content_type.contains("png") {
        Some(".png")
    } else if content_type.contains("gif") {
        Some(".gif")
    } else if content_type.contains("webp") {
        Some(".webp")
    } else if content_type.contains("bmp") {
        Some(".bmp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_inference() {
        assert_eq!(extension_from_url("http://x/a.PNG?k=v"), Some(".png"));
        assert_eq!(extension_from_url("http://x/a.jpeg"), Some(".jpg"));
        assert_eq!(extension_from_url("http://x/a"), None);
        assert_eq!(extension_from_content_type("image/webp"), Some(".webp"));
        assert_eq!(extension_from_content_type("text/html"), None);
    }

    #[test]
    fn md5_hex_is_stable() {
        let mut hasher = Md5::new();
        hasher.update(b"hello");
        assert_eq!(hex_lower(&hasher.finalize()), "5d41402abc4b2a76b9719d911017c592");
    }
}
