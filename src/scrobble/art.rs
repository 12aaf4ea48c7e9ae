use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtFetchError {
    #[error("cover art request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cover art response was empty")]
    Empty,
    #[error("failed to save cover art to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub trait ArtFetcher: Send {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ArtFetchError>;
}

pub struct HttpArtFetcher {
    http: Client,
}

impl HttpArtFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ArtFetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl ArtFetcher for HttpArtFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ArtFetchError> {
        let response = self.http.get(url).send()?.error_for_status()?;
        let bytes = response.bytes()?;
        if bytes.is_empty() {
            return Err(ArtFetchError::Empty);
        }
        log::debug!("Fetched {} bytes of cover art from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

/// Replace the image at `path` in one step: write a sibling temp file, then rename over.
pub fn persist_art(path: &Path, bytes: &[u8]) -> Result<(), ArtFetchError> {
    let io_err = |source| ArtFetchError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("art").join("image.jpg");
        persist_art(&path, b"first").unwrap();
        persist_art(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("art").join("image.jpg.part").exists());
    }
}
