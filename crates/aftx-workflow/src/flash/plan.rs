use aftx_core::device::Device;
use aftx_core::partition::{scan_images, ImageFile, PartitionClassifier};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// One image bound to the partition it will be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashStep {
    pub partition: String,
    pub image: ImageFile,
}

/// What a run will do, shown to the operator before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPlan {
    pub device: Device,
    pub image_dir: PathBuf,
    /// Classified images in listing order.
    pub steps: Vec<FlashStep>,
    /// Images with no partition; never flashed.
    pub skipped: Vec<ImageFile>,
}

impl FlashPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "Flash plan for {} from {}:",
            self.device,
            self.image_dir.display()
        ));
        for (idx, step) in self.steps.iter().enumerate() {
            lines.push(format!(
                "{:02}. {:<14} <- {}",
                idx + 1,
                step.partition,
                step.image.file_name
            ));
        }
        for image in &self.skipped {
            lines.push(format!("    (skipped) {} - unknown partition", image.file_name));
        }
        lines
    }
}

pub fn build_plan(
    device: &Device,
    image_dir: &Path,
    classifier: &PartitionClassifier,
) -> Result<FlashPlan> {
    let mut steps = Vec::new();
    let mut skipped = Vec::new();
    for image in scan_images(image_dir, classifier)? {
        match image.partition.clone() {
            Some(partition) => steps.push(FlashStep { partition, image }),
            None => skipped.push(image),
        }
    }
    Ok(FlashPlan {
        device: device.clone(),
        image_dir: image_dir.to_path_buf(),
        steps,
        skipped,
    })
}
