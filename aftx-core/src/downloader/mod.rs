//! Firmware bundle downloads.
//!
//! Transfers stream straight to disk and report progress per chunk. Every failure (transport,
//! HTTP status, local file, checksum) maps to [`FlashToolError::DownloadFailure`]; a partial
//! file is left in place for inspection or a retry.

mod types;

pub use types::{DownloadProgress, DownloadSession};

use crate::config::AppConfig;
use crate::errors::FlashToolError;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

const FALLBACK_ARCHIVE_NAME: &str = "bundle.zip";
const FALLBACK_BUNDLE_DIR: &str = "bundle";
const ARCHIVE_SUFFIXES: [&str; 7] = [".tar.gz", ".tar.xz", ".tgz", ".tar", ".zip", ".7z", ".rar"];

pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(cfg: &AppConfig) -> Result<Self, FlashToolError> {
        let mut builder = Client::builder().user_agent(cfg.http.user_agent.clone());
        if cfg.http.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(cfg.http.timeout_secs));
        } else {
            builder = builder.timeout(None::<Duration>);
        }
        let client = builder
            .build()
            .map_err(|err| FlashToolError::Config(format!("HTTP client: {}", err)))?;
        Ok(Self { client })
    }

    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        observer: &mut dyn FnMut(DownloadProgress),
    ) -> Result<DownloadSession, FlashToolError> {
        self.fetch(url, destination, None, observer)
    }

    /// Like [`Downloader::download`], then compare the SHA-256 of the received bytes.
    pub fn download_verified(
        &self,
        url: &str,
        destination: &Path,
        expected_sha256: &str,
        observer: &mut dyn FnMut(DownloadProgress),
    ) -> Result<DownloadSession, FlashToolError> {
        self.fetch(url, destination, Some(expected_sha256), observer)
    }

    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        expected_sha256: Option<&str>,
        observer: &mut dyn FnMut(DownloadProgress),
    ) -> Result<DownloadSession, FlashToolError> {
        log::info!("Downloading {} -> {}", url, destination.display());
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| FlashToolError::download(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FlashToolError::download(url, format!("HTTP {}", status)));
        }

        let total = response.content_length().filter(|len| *len > 0);
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| FlashToolError::download(url, err))?;
        }
        let mut file = File::create(destination).map_err(|err| {
            FlashToolError::download(url, format!("{}: {}", destination.display(), err))
        })?;

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 64 * 1024];
        let mut transferred: u64 = 0;
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| FlashToolError::download(url, err))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).map_err(|err| {
                FlashToolError::download(url, format!("{}: {}", destination.display(), err))
            })?;
            hasher.update(&buffer[..read]);
            transferred += read as u64;
            observer(DownloadProgress { transferred, total });
        }
        file.flush()
            .map_err(|err| FlashToolError::download(url, err))?;

        let sha256 = format!("{:x}", hasher.finalize());
        if let Some(expected) = expected_sha256 {
            if !sha256.eq_ignore_ascii_case(expected.trim()) {
                return Err(FlashToolError::download(
                    url,
                    format!("checksum mismatch: {} != {}", sha256, expected),
                ));
            }
        }

        log::info!("Downloaded {} bytes to {}", transferred, destination.display());
        Ok(DownloadSession {
            url: url.to_string(),
            destination: destination.to_path_buf(),
            expected: total,
            transferred,
            sha256,
        })
    }
}

/// Replace whitespace and path separators with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Local file name for the archive behind `url`: its last path segment, sanitized.
pub fn archive_file_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        })
        .map(|name| sanitize_file_name(&name))
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| FALLBACK_ARCHIVE_NAME.to_string())
}

/// Extraction directory name for an archive: its file name without archive suffixes, or with
/// `_extracted` appended when no known suffix is present.
///
/// Always a single plain path component: names made only of dots become `bundle`.
pub fn bundle_dir_name(archive: &Path) -> String {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stripped = ARCHIVE_SUFFIXES.iter().find_map(|suffix| {
        let cut = name.len().checked_sub(suffix.len())?;
        let tail = name.get(cut..)?;
        tail.eq_ignore_ascii_case(suffix)
            .then(|| sanitize_file_name(&name[..cut]))
    });
    let dir = match stripped {
        Some(stem) => stem,
        // Unknown suffix: the directory must not collide with the archive itself.
        None if !name.is_empty() => format!("{}_extracted", sanitize_file_name(&name)),
        None => String::new(),
    };
    if dir.chars().all(|c| c == '.') {
        FALLBACK_BUNDLE_DIR.to_string()
    } else {
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;

    fn downloader() -> Downloader {
        let mut cfg = AppConfig::default();
        cfg.http.timeout_secs = 5;
        Downloader::new(&cfg).unwrap()
    }

    #[test]
    fn streams_body_and_reports_progress() {
        let server = MockServer::start();
        let body = vec![7u8; 200_000];
        let mock = server.mock(|when, then| {
            when.method(GET).path("/fw/panther.zip");
            then.status(200).body(&body);
        });
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("dl/panther.zip");

        let mut seen = Vec::new();
        let session = downloader()
            .download(&server.url("/fw/panther.zip"), &dest, &mut |p| seen.push(p))
            .unwrap();

        mock.assert();
        assert_eq!(session.transferred, body.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), body);
        assert!(!seen.is_empty());
        let last = seen.last().unwrap();
        assert_eq!(last.transferred, body.len() as u64);
        assert_eq!(last.total, Some(body.len() as u64));
        assert_eq!(last.percent(), Some(100.0));
        assert!(seen.windows(2).all(|w| w[0].transferred < w[1].transferred));
    }

    /// Serve one chunked response without a Content-Length header.
    fn serve_chunked(chunks: &'static [&'static [u8]]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut byte = [0u8; 1];
            while !request.ends_with(b"\r\n\r\n") {
                stream.read_exact(&mut byte).unwrap();
                request.push(byte[0]);
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n")
                .unwrap();
            for chunk in chunks {
                write!(stream, "{:x}\r\n", chunk.len()).unwrap();
                stream.write_all(chunk).unwrap();
                stream.write_all(b"\r\n").unwrap();
                stream.flush().unwrap();
            }
            stream.write_all(b"0\r\n\r\n").unwrap();
        });
        format!("http://{}/fw/stream.zip", addr)
    }

    #[test]
    fn chunked_transfer_reports_unknown_total() {
        const CHUNKS: &[&[u8]] = &[b"first-part|", b"second-part|", b"tail"];
        let body: Vec<u8> = CHUNKS.concat();
        let url = serve_chunked(CHUNKS);
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("stream.zip");

        let mut seen = Vec::new();
        let session = downloader().download(&url, &dest, &mut |p| seen.push(p)).unwrap();

        assert_eq!(session.expected, None);
        assert_eq!(session.transferred, body.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), body);
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|p| p.total.is_none() && p.percent().is_none()));
        assert_eq!(seen.last().unwrap().transferred, body.len() as u64);
    }

    #[test]
    fn empty_body_reports_no_progress() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/empty.zip");
            then.status(200).body("");
        });
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("empty.zip");

        let mut seen = Vec::new();
        let session = downloader()
            .download(&server.url("/empty.zip"), &dest, &mut |p| seen.push(p))
            .unwrap();

        assert!(seen.is_empty());
        assert_eq!(session.expected, None);
        assert_eq!(session.transferred, 0);
        assert_eq!(fs::read(&dest).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn sends_configured_user_agent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/a.zip").header("user-agent", "bench-agent");
            then.status(200).body("zip");
        });
        let mut cfg = AppConfig::default();
        cfg.http.user_agent = "bench-agent".to_string();
        let tmp = tempdir().unwrap();

        Downloader::new(&cfg)
            .unwrap()
            .download(&server.url("/a.zip"), &tmp.path().join("a.zip"), &mut |_| {})
            .unwrap();
        mock.assert();
    }

    #[test]
    fn http_error_is_download_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.zip");
            then.status(404);
        });
        let tmp = tempdir().unwrap();
        let err = downloader()
            .download(&server.url("/missing.zip"), &tmp.path().join("m.zip"), &mut |_| {})
            .unwrap_err();
        match err {
            FlashToolError::DownloadFailure { reason, .. } => assert!(reason.contains("404")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unwritable_destination_is_download_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a.zip");
            then.status(200).body("zip");
        });
        let tmp = tempdir().unwrap();
        // A directory where the file should go.
        let dest = tmp.path().join("taken");
        fs::create_dir(&dest).unwrap();

        let err = downloader()
            .download(&server.url("/a.zip"), &dest, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, FlashToolError::DownloadFailure { .. }));
    }

    #[test]
    fn checksum_mismatch_keeps_partial_file() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a.zip");
            then.status(200).body("abcdef");
        });
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("a.zip");

        let err = downloader()
            .download_verified(&server.url("/a.zip"), &dest, "deadbeef", &mut |_| {})
            .unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(dest.exists());
    }

    #[test]
    fn checksum_match_is_accepted() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a.zip");
            then.status(200).body("abcdef");
        });
        let expected = format!("{:x}", Sha256::digest(b"abcdef"));
        let tmp = tempdir().unwrap();

        let session = downloader()
            .download_verified(
                &server.url("/a.zip"),
                &tmp.path().join("a.zip"),
                &expected.to_uppercase(),
                &mut |_| {},
            )
            .unwrap();
        assert_eq!(session.sha256, expected);
    }

    #[test]
    fn archive_names_from_urls() {
        assert_eq!(
            archive_file_name("https://dl.example.com/fw/panther-factory-14.zip?token=1"),
            "panther-factory-14.zip"
        );
        assert_eq!(
            archive_file_name("https://dl.example.com/fw/images/"),
            "images"
        );
        assert_eq!(archive_file_name("https://dl.example.com/"), "bundle.zip");
        assert_eq!(archive_file_name("not a url"), "bundle.zip");
    }

    #[test]
    fn sanitize_replaces_separators_and_whitespace() {
        assert_eq!(sanitize_file_name("a b/c\\d\te"), "a_b_c_d_e");
    }

    #[test]
    fn bundle_dir_strips_archive_suffix() {
        assert_eq!(bundle_dir_name(Path::new("/dl/panther-14.zip")), "panther-14");
        assert_eq!(bundle_dir_name(Path::new("fw.TAR.GZ")), "fw");
        assert_eq!(bundle_dir_name(Path::new("odd.bin")), "odd.bin_extracted");
        assert_eq!(bundle_dir_name(Path::new(".zip")), "bundle");
    }

    #[test]
    fn dot_only_stems_never_escape_the_downloads_dir() {
        assert_eq!(bundle_dir_name(Path::new("/dl/...zip")), "bundle");
        assert_eq!(bundle_dir_name(Path::new("/dl/..tar.gz")), "bundle");
        assert_eq!(bundle_dir_name(Path::new("/dl/..")), "bundle");
        assert_eq!(archive_file_name("https://dl.example.com/fw/...zip"), "...zip");
        assert_eq!(
            bundle_dir_name(Path::new(&archive_file_name("https://dl.example.com/fw/...zip"))),
            "bundle"
        );
    }
}
