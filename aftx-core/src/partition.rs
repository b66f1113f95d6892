//! Partition classification of image files by name.
//!
//! Rules are an ordered list evaluated first-match-wins against the lowercased file name. Any
//! canonical name that contains a shorter canonical name sits ahead of it, so `vendor_boot.img`
//! never resolves to `boot` and `vbmeta_system.img` never resolves to `system`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Full image name, e.g. `boot.img`.
    Canonical,
    /// Short fallback token, consulted only after every canonical rule.
    Loose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRule {
    pub needle: String,
    pub label: String,
    pub kind: RuleKind,
}

impl PartitionRule {
    pub fn canonical(needle: &str, label: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
            label: label.to_string(),
            kind: RuleKind::Canonical,
        }
    }

    pub fn loose(token: &str) -> Self {
        Self {
            needle: token.to_lowercase(),
            label: token.to_string(),
            kind: RuleKind::Loose,
        }
    }

    fn matches(&self, lowered_name: &str) -> bool {
        lowered_name.contains(&self.needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionClassifier {
    rules: Vec<PartitionRule>,
}

impl Default for PartitionClassifier {
    fn default() -> Self {
        let canonical = [
            ("vendor_boot", "vendor_boot"),
            ("init_boot", "init_boot"),
            ("boot.img", "boot"),
            ("vbmeta_system", "vbmeta_system"),
            ("vbmeta_vendor", "vbmeta_vendor"),
            ("vbmeta.img", "vbmeta"),
            ("system_ext", "system_ext"),
            ("system.img", "system"),
            ("vendor_dlkm", "vendor_dlkm"),
            ("vendor.img", "vendor"),
            ("dtbo.img", "dtbo"),
            ("recovery.img", "recovery"),
            ("product.img", "product"),
            ("userdata.img", "userdata"),
        ];
        let mut rules: Vec<PartitionRule> = canonical
            .iter()
            .map(|(needle, label)| PartitionRule::canonical(needle, label))
            .collect();
        rules.extend(["boot", "system", "vendor"].map(PartitionRule::loose));
        Self { rules }
    }
}

impl PartitionClassifier {
    /// Canonical rules must precede loose ones; they are stably reordered if not.
    pub fn with_rules(mut rules: Vec<PartitionRule>) -> Self {
        rules.sort_by_key(|rule| rule.kind == RuleKind::Loose);
        Self { rules }
    }

    pub fn rules(&self) -> &[PartitionRule] {
        &self.rules
    }

    pub fn classify(&self, file_name: &str) -> Option<&str> {
        let lowered = file_name.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.label.as_str())
    }
}

/// An image found in an extracted bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub path: PathBuf,
    pub file_name: String,
    /// `None` means unclassified; such images are never flashed.
    pub partition: Option<String>,
}

impl ImageFile {
    pub fn classify(path: PathBuf, classifier: &PartitionClassifier) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partition = classifier.classify(&file_name).map(str::to_string);
        Self {
            path,
            file_name,
            partition,
        }
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("img"))
        .unwrap_or(false)
}

/// Classify the `.img` files directly inside `dir`, ordered by file name.
pub fn scan_images(dir: &Path, classifier: &PartitionClassifier) -> Result<Vec<ImageFile>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && is_image_file(&path) {
            images.push(ImageFile::classify(path, classifier));
        }
    }
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(images)
}
