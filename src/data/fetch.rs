use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use reqwest::blocking::Client;

use crate::config::{Compression, DatasetId, DatasetRegistry};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Fetcher – where archive bytes come from
// ---------------------------------------------------------------------------

/// Source of remote archive bodies.
pub trait Fetcher {
    /// Open the body of `url` for reading. A non-success status is an error.
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>>;
}

/// Blocking HTTP(S) fetcher. Follows redirects; no retries.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// No overall request timeout; only connecting is bounded.
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .user_agent(concat!("psp-data/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DatasetError::Fetch {
                url: String::new(),
                reason: format!("building HTTP client: {e}"),
            })?;
        Ok(HttpFetcher { client })
    }

    pub fn with_client(client: Client) -> Self {
        HttpFetcher { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>> {
        let fetch_err = |reason: String| DatasetError::Fetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }
        if let Some(len) = response.content_length() {
            debug!("{url}: {len} bytes");
        }
        Ok(Box::new(response))
    }
}

// ---------------------------------------------------------------------------
// ensure_local – fetch-if-absent, then decompress
// ---------------------------------------------------------------------------

/// Make sure the decompressed archive for `id` exists under the registry's
/// data directory and return its path.
///
/// An archive that is already present is returned without touching the
/// network. Otherwise the compressed body is downloaded, decompressed and the
/// compressed copy removed, leaving exactly one file behind. On failure any
/// partial output is removed; local filesystem failures come back as
/// [`DatasetError::Io`] and are also logged as warnings.
pub fn ensure_local(
    registry: &DatasetRegistry,
    id: DatasetId,
    fetcher: &dyn Fetcher,
) -> Result<PathBuf> {
    let desc = registry.descriptor(id)?;
    let dir = &registry.data_dir;
    let archive = dir.join(&desc.archive_file);

    if archive.is_file() {
        info!("{id} already present at {}", archive.display());
        return Ok(archive);
    }

    let compressed = dir.join(&desc.compressed_file);
    let result = acquire(dir, &desc.url, desc.compression, &compressed, &archive, fetcher);

    if let Err(e) = &result {
        remove_if_present(&compressed);
        remove_if_present(&archive);
        if e.is_recoverable() {
            warn!("error downloading and exporting {id}: {e}");
        }
    }
    result.map(|()| archive)
}

fn acquire(
    dir: &Path,
    url: &str,
    compression: Compression,
    compressed: &Path,
    archive: &Path,
    fetcher: &dyn Fetcher,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| DatasetError::io(dir, e))?;

    info!("downloading {url}");
    let mut body = fetcher.fetch(url)?;
    let written = write_body(&mut body, compressed)?;
    debug!("wrote {written} bytes to {}", compressed.display());

    match compression {
        Compression::Gzip => {
            info!("decompressing {}", compressed.display());
            decompress_gzip(compressed, archive)?;
            fs::remove_file(compressed).map_err(|e| DatasetError::io(compressed, e))?;
        }
        Compression::None => {
            if compressed != archive {
                fs::rename(compressed, archive).map_err(|e| DatasetError::io(archive, e))?;
            }
        }
    }
    Ok(())
}

fn write_body(body: &mut dyn Read, dest: &Path) -> Result<u64> {
    let file = File::create(dest).map_err(|e| DatasetError::io(dest, e))?;
    let mut writer = BufWriter::new(file);
    let n = io::copy(body, &mut writer).map_err(|e| DatasetError::io(dest, e))?;
    writer.flush().map_err(|e| DatasetError::io(dest, e))?;
    Ok(n)
}

/// Decompress the first gzip member of `src` into `dst`.
///
/// Read-side failures (corrupt or truncated input) are
/// [`DatasetError::Decompress`]; write-side failures are [`DatasetError::Io`].
pub fn decompress_gzip(src: &Path, dst: &Path) -> Result<u64> {
    let input = File::open(src).map_err(|e| DatasetError::io(src, e))?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let output = File::create(dst).map_err(|e| DatasetError::io(dst, e))?;
    let mut writer = BufWriter::new(output);

    let mut buf = vec![0u8; 1 << 16];
    let mut total = 0u64;
    loop {
        let n = decoder.read(&mut buf).map_err(|source| DatasetError::Decompress {
            path: src.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .map_err(|e| DatasetError::io(dst, e))?;
        total += n as u64;
    }
    writer.flush().map_err(|e| DatasetError::io(dst, e))?;
    Ok(total)
}

fn remove_if_present(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("could not remove partial file {}: {e}", path.display());
        }
    }
}
