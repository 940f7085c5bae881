//! Downloading of library artifacts.
//!
//! Libraries may name one or more download sources, tried in order. All
//! attempted sources are reported when none succeeds.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use url::Url;

use crate::util::fs::ensure_dir;

/// Download `urls` (in order) into `path`, returning the URL that worked.
pub fn download(path: &Path, urls: &[String]) -> Result<String> {
    if urls.is_empty() {
        bail!("no download sources for {}", path.display());
    }
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let client = reqwest::blocking::Client::builder()
        .build()
        .context("failed to construct HTTP client")?;

    let mut attempts = Vec::new();
    for raw in urls {
        let url = match Url::parse(raw) {
            Ok(u) => u,
            Err(e) => {
                attempts.push(format!("{}: invalid URL ({})", raw, e));
                continue;
            }
        };
        tracing::info!("downloading {} from {}", path.display(), url);
        match fetch(&client, &url, path) {
            Ok(()) => return Ok(raw.clone()),
            Err(e) => attempts.push(format!("{}: {}", raw, e)),
        }
    }

    bail!(
        "could not download {}; attempted sources:\n  {}",
        path.display(),
        attempts.join("\n  ")
    );
}

fn fetch(client: &reqwest::blocking::Client, url: &Url, path: &Path) -> Result<()> {
    let mut response = client
        .get(url.clone())
        .send()
        .with_context(|| format!("request to {} failed", url))?;
    if !response.status().is_success() {
        bail!("server returned {}", response.status());
    }
    let mut body = Vec::new();
    response
        .read_to_end(&mut body)
        .with_context(|| format!("reading response body from {}", url))?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Hex-encoded SHA-256 digest of a file's contents.
pub fn sha256_of_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// The cached digest stored next to an artifact, if present.
///
/// Digest files hold the hex digest in their first 64 characters; anything
/// after (filename, newline) is ignored.
pub fn cached_digest(digest_path: &Path) -> Option<String> {
    let content = fs::read_to_string(digest_path).ok()?;
    let digest: String = content.chars().take(64).collect();
    if digest.len() == 64 {
        Some(digest)
    } else {
        None
    }
}

/// Write the digest cache file for an artifact.
pub fn write_cached_digest(digest_path: &Path, digest: &str) -> Result<()> {
    fs::write(digest_path, digest)
        .with_context(|| format!("failed to write {}", digest_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_of_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.jar");
        fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha256_of_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_cached_digest_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let digest_path = tmp.path().join("a.jar.sha256");
        let digest = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

        write_cached_digest(&digest_path, digest).unwrap();
        assert_eq!(cached_digest(&digest_path).as_deref(), Some(digest));
        assert_eq!(cached_digest(&tmp.path().join("missing")), None);
    }

    #[test]
    fn test_download_with_no_sources() {
        let tmp = TempDir::new().unwrap();
        let err = download(&tmp.path().join("a.jar"), &[]).unwrap_err();
        assert!(err.to_string().contains("no download sources"));
    }
}
