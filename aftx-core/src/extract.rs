//! Archive extraction through a prioritized chain of extractors.
//!
//! Extractor exit status is not trusted. After each attempt the destination is rescanned and the
//! first attempt that leaves at least one `.img` file behind wins. The destination is emptied
//! before every attempt so files from an earlier run or a failed attempt cannot count.

use crate::errors::FlashToolError;
use crate::partition::is_image_file;
use aftx_hal::{CommandLine, ProcessOps};
use anyhow::{bail, Context, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;
use zip::ZipArchive;

pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    /// Unpack `archive` into `destination`.
    ///
    /// An `Ok` return says nothing about success; the chain decides that by inspecting the
    /// destination.
    fn extract(&self, archive: &Path, destination: &Path) -> Result<()>;
}

/// Built-in zip reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
    fn name(&self) -> &str {
        "zip"
    }

    fn extract(&self, archive: &Path, destination: &Path) -> Result<()> {
        let file = fs::File::open(archive)
            .with_context(|| format!("failed to open {}", archive.display()))?;
        let mut zip = ZipArchive::new(file)
            .with_context(|| format!("failed to read zip {}", archive.display()))?;
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let outpath = match entry.enclosed_name() {
                Some(path) => destination.join(path),
                None => {
                    log::warn!("skipping unsafe zip entry {}", entry.name());
                    continue;
                }
            };
            if entry.is_dir() {
                fs::create_dir_all(&outpath)?;
                continue;
            }
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&outpath)
                .with_context(|| format!("failed to create {}", outpath.display()))?;
            io::copy(&mut entry, &mut out)?;
        }
        Ok(())
    }
}

/// An external extraction tool run through the process runner.
///
/// Argument templates may contain `{archive}` and `{dest}`.
pub struct ToolExtractor {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    hal: Arc<dyn ProcessOps>,
}

impl ToolExtractor {
    pub fn new(
        hal: Arc<dyn ProcessOps>,
        program: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            name: program.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
            hal,
        }
    }

    pub fn tar(hal: Arc<dyn ProcessOps>, timeout: Option<Duration>) -> Self {
        Self::new(hal, "tar", &["-xf", "{archive}", "-C", "{dest}"], timeout)
    }

    pub fn unzip(hal: Arc<dyn ProcessOps>, timeout: Option<Duration>) -> Self {
        Self::new(hal, "unzip", &["-o", "{archive}", "-d", "{dest}"], timeout)
    }

    pub fn seven_zip(hal: Arc<dyn ProcessOps>, timeout: Option<Duration>) -> Self {
        Self::new(hal, "7z", &["x", "-y", "-o{dest}", "{archive}"], timeout)
    }

    fn command(&self, archive: &Path, destination: &Path) -> CommandLine {
        let archive = archive.to_string_lossy();
        let destination = destination.to_string_lossy();
        CommandLine::new(&self.program)
            .args(self.args.iter().map(|arg| {
                arg.replace("{archive}", &archive)
                    .replace("{dest}", &destination)
            }))
            .timeout(self.timeout)
    }
}

impl Extractor for ToolExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, archive: &Path, destination: &Path) -> Result<()> {
        let out = self.hal.run(&self.command(archive, destination));
        if !out.started() {
            bail!("{} could not be started", self.program);
        }
        if !out.succeeded() {
            log::debug!("{} reported {:?}: {}", self.program, out.status, out.text);
        }
        Ok(())
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSet {
    pub extractor: String,
    pub destination: PathBuf,
    /// Every `.img` file found, sorted by path.
    pub images: Vec<PathBuf>,
}

impl ExtractedSet {
    /// Directory holding the images: the parent of the first one found.
    pub fn image_dir(&self) -> PathBuf {
        self.images
            .first()
            .and_then(|img| img.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.destination.clone())
    }
}

pub struct ExtractorChain {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorChain {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// Built-in zip, then `tar`, then `unzip` (not on Windows), then `7z`.
    pub fn platform_default(hal: Arc<dyn ProcessOps>, timeout: Option<Duration>) -> Self {
        let mut extractors: Vec<Box<dyn Extractor>> = vec![
            Box::new(ZipExtractor),
            Box::new(ToolExtractor::tar(hal.clone(), timeout)),
        ];
        if !cfg!(windows) {
            extractors.push(Box::new(ToolExtractor::unzip(hal.clone(), timeout)));
        }
        extractors.push(Box::new(ToolExtractor::seven_zip(hal, timeout)));
        Self { extractors }
    }

    pub fn names(&self) -> Vec<String> {
        self.extractors.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn extract(&self, archive: &Path, destination: &Path) -> Result<ExtractedSet, FlashToolError> {
        let mut tried = Vec::new();
        for extractor in &self.extractors {
            tried.push(extractor.name().to_string());
            prepare_destination(destination, archive)?;

            log::info!("Extracting {} with {}", archive.display(), extractor.name());
            if let Err(err) = extractor.extract(archive, destination) {
                log::warn!("{} failed on {}: {:#}", extractor.name(), archive.display(), err);
            }

            let images = find_images(destination, archive);
            if !images.is_empty() {
                log::info!("{} produced {} image(s)", extractor.name(), images.len());
                return Ok(ExtractedSet {
                    extractor: extractor.name().to_string(),
                    destination: destination.to_path_buf(),
                    images,
                });
            }
        }
        Err(FlashToolError::ExtractionExhausted {
            archive: archive.to_path_buf(),
            tried,
        })
    }
}

/// Create `destination` and remove its contents, sparing `archive` and any directory holding it.
///
/// A destination containing `..` is refused.
fn prepare_destination(destination: &Path, archive: &Path) -> Result<(), FlashToolError> {
    if destination
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(FlashToolError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to clear {}", destination.display()),
        )));
    }
    fs::create_dir_all(destination)?;
    let archive = fs::canonicalize(archive).unwrap_or_else(|_| archive.to_path_buf());
    for entry in fs::read_dir(destination)? {
        let path = entry?.path();
        let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if archive.starts_with(&canonical) {
            continue;
        }
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// All `.img` files below `dir`, sorted by path.
pub fn find_images(dir: &Path, archive: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path != archive && is_image_file(path))
        .collect();
    images.sort();
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use aftx_hal::{FakeHal, FakeReply};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
    }

    /// Writes the given files, then reports failure anyway.
    struct LeavesFilesButFails {
        files: Vec<&'static str>,
    }

    impl Extractor for LeavesFilesButFails {
        fn name(&self) -> &str {
            "flaky"
        }

        fn extract(&self, _archive: &Path, destination: &Path) -> Result<()> {
            for f in &self.files {
                fs::write(destination.join(f), b"img").unwrap();
            }
            bail!("exit status 1")
        }
    }

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
        leaves: Option<&'static str>,
        name: &'static str,
    }

    impl Extractor for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn extract(&self, _archive: &Path, destination: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(self.name.to_string());
            if let Some(f) = self.leaves {
                fs::write(destination.join(f), b"img").unwrap();
            }
            Ok(())
        }
    }

    #[test]
    fn zip_extractor_unpacks_nested_images() {
        let tmp = tempdir().unwrap();
        let archive = tmp.path().join("fw.zip");
        write_zip(
            &archive,
            &[
                ("panther/boot.img", b"boot"),
                ("panther/vendor_boot.img", b"vb"),
                ("panther/flash-all.sh", b"#!/bin/sh"),
            ],
        );
        let dest = tmp.path().join("out");

        let chain = ExtractorChain::new(vec![Box::new(ZipExtractor)]);
        let set = chain.extract(&archive, &dest).unwrap();

        assert_eq!(set.extractor, "zip");
        assert_eq!(set.images.len(), 2);
        assert_eq!(set.image_dir(), dest.join("panther"));
    }

    #[test]
    fn non_zero_exit_with_images_counts_as_success() {
        let tmp = tempdir().unwrap();
        let archive = tmp.path().join("fw.bin");
        fs::write(&archive, b"junk").unwrap();
        let dest = tmp.path().join("out");

        let chain = ExtractorChain::new(vec![Box::new(LeavesFilesButFails {
            files: vec!["boot.img", "system.img"],
        })]);
        let set = chain.extract(&archive, &dest).unwrap();
        assert_eq!(set.extractor, "flaky");
        assert_eq!(set.images.len(), 2);
    }

    #[test]
    fn chain_short_circuits_on_first_productive_extractor() {
        let tmp = tempdir().unwrap();
        let archive = tmp.path().join("fw.tar");
        fs::write(&archive, b"junk").unwrap();
        let dest = tmp.path().join("out");

        let first = Recording {
            name: "first",
            ..Default::default()
        };
        let second = Recording {
            name: "second",
            leaves: Some("boot.img"),
            ..Default::default()
        };
        let third = Recording {
            name: "third",
            leaves: Some("vendor.img"),
            ..Default::default()
        };
        let chain = ExtractorChain::new(vec![Box::new(first), Box::new(second), Box::new(third)]);

        let set = chain.extract(&archive, &dest).unwrap();
        assert_eq!(set.extractor, "second");
        assert_eq!(set.images, vec![dest.join("boot.img")]);
    }

    #[test]
    fn stale_images_are_cleared_before_each_attempt() {
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("out");
        fs::create_dir_all(dest.join("old")).unwrap();
        fs::write(dest.join("boot.img"), b"stale").unwrap();
        fs::write(dest.join("old/system.img"), b"stale").unwrap();
        // The archive lives inside the destination and must survive.
        let archive = dest.join("fw.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let chain = ExtractorChain::new(vec![Box::new(ZipExtractor)]);
        let err = chain.extract(&archive, &dest).unwrap_err();

        match err {
            FlashToolError::ExtractionExhausted { tried, .. } => assert_eq!(tried, vec!["zip"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(archive.exists());
        assert!(!dest.join("boot.img").exists());
        assert!(!dest.join("old").exists());
    }

    #[test]
    fn parent_dir_destination_is_never_cleared() {
        let tmp = tempdir().unwrap();
        let downloads = tmp.path().join("downloads");
        fs::create_dir_all(&downloads).unwrap();
        fs::write(tmp.path().join("precious.txt"), b"keep").unwrap();
        let archive = downloads.join("fw.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let chain = ExtractorChain::new(vec![Box::new(ZipExtractor)]);
        let err = chain.extract(&archive, &downloads.join("..")).unwrap_err();

        assert!(matches!(err, FlashToolError::Io(_)));
        assert!(tmp.path().join("precious.txt").exists());
        assert!(archive.exists());
    }

    #[test]
    fn tool_extractors_run_through_the_process_runner() {
        let tmp = tempdir().unwrap();
        let archive = tmp.path().join("fw.7z");
        fs::write(&archive, b"7z").unwrap();
        let dest = tmp.path().join("out");

        let hal = FakeHal::new();
        hal.expect("tar", "-xf", FakeReply::exit(2, "tar: This does not look like a tar archive"))
            .expect("unzip", "", FakeReply::SpawnFailure);
        let hal: Arc<dyn ProcessOps> = Arc::new(hal.clone());
        let chain = ExtractorChain::platform_default(hal, Some(Duration::from_secs(5)));

        let err = chain.extract(&archive, &dest).unwrap_err();
        match err {
            FlashToolError::ExtractionExhausted { tried, .. } => {
                assert_eq!(tried.first().map(String::as_str), Some("zip"));
                assert_eq!(tried.last().map(String::as_str), Some("7z"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tool_command_substitutes_paths() {
        let hal: Arc<dyn ProcessOps> = Arc::new(FakeHal::new());
        let cmd = ToolExtractor::seven_zip(hal, None)
            .command(Path::new("/dl/fw.7z"), Path::new("/dl/fw"));
        assert_eq!(cmd.to_string(), "7z x -y -o/dl/fw /dl/fw.7z");
    }
}
