use crate::downloader::{
    archive_file_name, bundle_dir_name, DownloadProgress, DownloadSession, Downloader,
};
use crate::errors::FlashToolError;
use crate::extract::{ExtractedSet, ExtractorChain};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Outcome of fetching and unpacking a firmware bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Ready {
        session: Option<DownloadSession>,
        extracted: ExtractedSet,
    },
    /// No extractor could unpack the archive. The user has to extract it by hand, into
    /// `destination` or anywhere else, and point the tool at that directory.
    ManualExtractionRequired {
        archive: PathBuf,
        destination: PathBuf,
    },
}

/// Download `url` into `downloads_dir` and extract it next to the archive.
///
/// Layout: `<downloads_dir>/<archive name>` and `<downloads_dir>/<archive stem>/`.
pub fn acquire_bundle(
    downloader: &Downloader,
    chain: &ExtractorChain,
    downloads_dir: &Path,
    url: &str,
    expected_sha256: Option<&str>,
    observer: &mut dyn FnMut(DownloadProgress),
) -> Result<Acquisition, FlashToolError> {
    let archive = downloads_dir.join(archive_file_name(url));
    let session = match expected_sha256 {
        Some(sha) => downloader.download_verified(url, &archive, sha, observer)?,
        None => downloader.download(url, &archive, observer)?,
    };
    Ok(match extract_archive(chain, &archive, downloads_dir)? {
        Acquisition::Ready { extracted, .. } => Acquisition::Ready {
            session: Some(session),
            extracted,
        },
        manual => manual,
    })
}

/// Extract an archive already on disk into `<downloads_dir>/<archive stem>/`.
pub fn extract_archive(
    chain: &ExtractorChain,
    archive: &Path,
    downloads_dir: &Path,
) -> Result<Acquisition, FlashToolError> {
    let destination = downloads_dir.join(bundle_dir_name(archive));
    ensure_inside(&destination, downloads_dir)?;
    match chain.extract(archive, &destination) {
        Ok(extracted) => Ok(Acquisition::Ready {
            session: None,
            extracted,
        }),
        Err(FlashToolError::ExtractionExhausted { archive, tried }) => {
            log::warn!(
                "Could not extract {} (tried {}); manual extraction required",
                archive.display(),
                tried.join(", ")
            );
            Ok(Acquisition::ManualExtractionRequired {
                archive,
                destination,
            })
        }
        Err(err) => Err(err),
    }
}

/// `destination` must be exactly one plain component below `downloads_dir`.
fn ensure_inside(destination: &Path, downloads_dir: &Path) -> Result<(), FlashToolError> {
    let mut rest = destination
        .strip_prefix(downloads_dir)
        .map(Path::components)
        .map_err(|_| outside(destination, downloads_dir))?;
    match (rest.next(), rest.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(outside(destination, downloads_dir)),
    }
}

fn outside(destination: &Path, downloads_dir: &Path) -> FlashToolError {
    FlashToolError::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!(
            "refusing to extract into {}: not inside {}",
            destination.display(),
            downloads_dir.display()
        ),
    ))
}
