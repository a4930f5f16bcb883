//! Materializes a split assignment as `<root>/<split>/<category>/` folders

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::split::{assign, SplitName};
use crate::config::SplitRatios;
use crate::processing::list_images;
use crate::utils::error::{DatasetGenError, Result};
use crate::utils::{check_dir_name, percentage};

/// Extensions the organizer and the dataset scanners recognise
pub const DATASET_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Where one split ended up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitInfo {
    /// Files written into the split
    pub count: usize,
    /// `<split>/<category>`, relative to the dataset root
    pub path: String,
}

/// Record returned by [`DatasetOrganizer::organize`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeSummary {
    pub category: String,
    /// Images found in the input directory
    pub total_images: usize,
    pub splits: BTreeMap<SplitName, SplitInfo>,
    pub ratios: SplitRatios,
    pub random_seed: u64,
    /// RFC 3339, local time
    pub created_at: String,
    /// Absolute dataset root
    pub root_path: PathBuf,
}

impl OrganizeSummary {
    /// Files written into `split`
    pub fn count(&self, split: SplitName) -> usize {
        self.splits.get(&split).map(|s| s.count).unwrap_or(0)
    }

    /// Files written across all splits
    pub fn organized(&self) -> usize {
        self.splits.values().map(|s| s.count).sum()
    }
}

/// Per-split counts of an existing dataset tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitSummary {
    /// Category name -> image count
    pub categories: BTreeMap<String, usize>,
    pub total: usize,
}

/// Result of [`dataset_summary`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Only splits present on disk
    pub splits: BTreeMap<SplitName, SplitSummary>,
    pub total_images: usize,
    /// Sorted, deduplicated
    pub categories: Vec<String>,
}

/// Splits a flat directory of images into train/val/test folders
#[derive(Debug, Clone)]
pub struct DatasetOrganizer {
    ratios: SplitRatios,
    seed: u64,
}

impl DatasetOrganizer {
    /// Create an organizer; ratios must sum to 1.0 within tolerance
    pub fn new(ratios: SplitRatios, seed: u64) -> Result<Self> {
        ratios.validate()?;
        Ok(Self { ratios, seed })
    }

    pub fn ratios(&self) -> &SplitRatios {
        &self.ratios
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Shuffle and split the images of `input_dir` into `output_dir`
    ///
    /// Files are copied unless `move_files` is set. With `clean_output` an
    /// existing `output_dir` is removed first.
    pub fn organize(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        category: &str,
        clean_output: bool,
        move_files: bool,
    ) -> Result<OrganizeSummary> {
        check_dir_name(category, "category")?;
        let files = list_images(input_dir, &DATASET_EXTENSIONS)?;
        if files.is_empty() {
            return Err(DatasetGenError::NoImages(input_dir.to_path_buf()));
        }

        let total = files.len();
        info!(
            "Organizing {} images as '{}' (train={}, val={}, test={}, seed={})",
            total, category, self.ratios.train, self.ratios.val, self.ratios.test, self.seed
        );

        // Fresh generator per call: same files + seed -> same split
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let assignment = assign(files, &self.ratios, &mut rng);

        for split in SplitName::ALL {
            let n = assignment.get(split).len();
            info!(
                "  {:<5} {} images ({:.1}%)",
                split.as_str(),
                n,
                percentage(n, total)
            );
        }

        if clean_output && output_dir.exists() {
            debug!("Removing existing dataset at {:?}", output_dir);
            fs::remove_dir_all(output_dir)?;
        }

        let mut splits = BTreeMap::new();
        for split in SplitName::ALL {
            let dest_dir = output_dir.join(split.as_str()).join(category);
            fs::create_dir_all(&dest_dir)?;

            let placed = transfer_files(assignment.get(split), &dest_dir, move_files);
            splits.insert(
                split,
                SplitInfo {
                    count: placed,
                    path: format!("{}/{}", split.as_str(), category),
                },
            );
        }

        let root_path = fs::canonicalize(output_dir).unwrap_or_else(|_| output_dir.to_path_buf());
        let summary = OrganizeSummary {
            category: category.to_string(),
            total_images: total,
            splits,
            ratios: self.ratios,
            random_seed: self.seed,
            created_at: Local::now().to_rfc3339(),
            root_path,
        };

        info!(
            "Dataset organized at {:?}: train={} val={} test={}",
            summary.root_path,
            summary.count(SplitName::Train),
            summary.count(SplitName::Val),
            summary.count(SplitName::Test)
        );

        Ok(summary)
    }
}

/// Copy or move `files` into `dest_dir`, returning how many made it
fn transfer_files(files: &[PathBuf], dest_dir: &Path, move_files: bool) -> usize {
    let mut placed = 0;

    for src in files {
        let Some(name) = src.file_name() else {
            warn!("Skipping {:?}: no file name", src);
            continue;
        };
        let dst = dest_dir.join(name);

        let outcome = if move_files {
            // rename fails across filesystems
            fs::rename(src, &dst).or_else(|_| fs::copy(src, &dst).and_then(|_| fs::remove_file(src)))
        } else {
            fs::copy(src, &dst).map(|_| ())
        };

        match outcome {
            Ok(()) => placed += 1,
            Err(e) => warn!("Failed to place {:?} in {:?}: {}", src, dest_dir, e),
        }
    }

    placed
}

/// Count the images of an organized dataset by split and category
pub fn dataset_summary(root: &Path) -> Result<DatasetSummary> {
    if !root.is_dir() {
        return Err(DatasetGenError::PathNotFound(root.to_path_buf()));
    }

    let mut summary = DatasetSummary::default();
    let mut categories = BTreeSet::new();

    for split in SplitName::ALL {
        let split_dir = root.join(split.as_str());
        if !split_dir.is_dir() {
            continue;
        }

        let mut split_summary = SplitSummary::default();
        for category_dir in subdirectories(&split_dir)? {
            let name = category_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let count = list_images(&category_dir, &DATASET_EXTENSIONS)?.len();

            categories.insert(name.clone());
            split_summary.total += count;
            split_summary.categories.insert(name, count);
        }

        summary.total_images += split_summary.total;
        summary.splits.insert(split, split_summary);
    }

    summary.categories = categories.into_iter().collect();
    Ok(summary)
}

/// Immediate subdirectories of `dir`, sorted by name
pub(crate) fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
