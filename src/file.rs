use anyhow::{Error, Result};
use mime_guess::{Mime, from_path};
use std::{fs::File as FsFile, path::PathBuf};
use tiny_http::{Header, Response};

/// The triplet of headers that tells browsers and intermediaries to never
/// cache a response, so edits to the site show up on plain reload.
pub fn no_cache_headers() -> Result<[Header; 3]> {
    Ok([
        header("Cache-Control", "no-cache, no-store, must-revalidate")?,
        header("Pragma", "no-cache")?,
        header("Expires", "0")?,
    ])
}

pub fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|_| Error::msg("Could not create header"))
}

#[derive(Clone)]
pub struct File {
    pub path: PathBuf,
    pub mime: Mime,
    pub size: u64,
}

impl File {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mime = from_path(&path).first_or_octet_stream();
        let metadata = FsFile::open(&path).and_then(|file| file.metadata())?;

        Ok(Self {
            path,
            mime,
            size: metadata.len(),
        })
    }

    pub fn get_response(&self) -> Result<Response<FsFile>> {
        let fs_file = FsFile::open(&self.path)?;
        let mut response = Response::from_file(fs_file)
            .with_header(header("Content-Type", self.mime.essence_str())?);

        for no_cache_header in no_cache_headers()? {
            response = response.with_header(no_cache_header);
        }

        Ok(response)
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}
