//! End-to-end runs of the generation pipeline against an in-memory source

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

use dataset_generator::config::{PipelineConfig, SplitRatios};
use dataset_generator::export::DatasetMetadata;
use dataset_generator::pipeline::{DatasetRequest, FailureReason, Pipeline, PipelineStage};
use dataset_generator::source::{ImageReference, ImageSource};
use dataset_generator::utils::error::{DatasetGenError, Result};

/// Serves synthetic PNGs from memory
struct MemorySource {
    images: Vec<Vec<u8>>,
}

impl MemorySource {
    /// `n` opaque-and-transparent PNGs of varying aspect ratio, each `min_side` or larger
    fn with_images(n: usize, min_side: u32) -> Self {
        let images = (0..n)
            .map(|i| {
                let w = min_side + (i as u32 * 13) % 90;
                let h = min_side + (i as u32 * 29) % 60;
                let alpha = if i % 3 == 0 { 128 } else { 255 };
                let img = RgbaImage::from_pixel(w, h, Rgba([(i * 20) as u8, 90, 160, alpha]));
                encode_png(DynamicImage::ImageRgba8(img))
            })
            .collect();
        Self { images }
    }
}

impl ImageSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn search(&self, _query: &str, count: usize) -> Vec<ImageReference> {
        (0..self.images.len().min(count))
            .map(|i| ImageReference::from_url(format!("mem://{}", i)))
            .collect()
    }

    fn fetch(&self, reference: &ImageReference) -> Result<Vec<u8>> {
        let url = reference.url.clone().unwrap_or_default();
        url.strip_prefix("mem://")
            .and_then(|i| i.parse::<usize>().ok())
            .and_then(|i| self.images.get(i).cloned())
            .ok_or(DatasetGenError::Download {
                url,
                reason: "not found".to_string(),
            })
    }
}

fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn config_in(dir: &Path, target_size: u32, seed: u64) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.processing.target_size = target_size;
    config.split.ratios = SplitRatios::new(0.7, 0.15, 0.15).unwrap();
    config.split.seed = seed;
    config.source.download_delay_ms = 0;
    config.temp_dir = dir.join("temp");
    config
}

fn request_in(dir: &Path, num_images: usize) -> DatasetRequest {
    DatasetRequest {
        description: "Synthetic cats".to_string(),
        output_base_dir: dir.join("processed"),
        ..DatasetRequest::new("Orange Cats", num_images, "Orange Cats Dataset")
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

#[test]
fn generates_split_dataset_with_metadata() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_in(dir.path(), 64, 7), MemorySource::with_images(12, 120)).unwrap();

    let result = pipeline.generate(&request_in(dir.path(), 10));

    assert!(result.success, "pipeline failed: {:?}", result.error);
    assert!(result.failure.is_none());
    assert_eq!(result.category, "orange_cats");

    let download = result.stages.download.as_ref().unwrap();
    assert_eq!(download.found, 10);
    assert_eq!(download.downloaded.len(), 10);
    assert_eq!(result.stages.process.as_ref().unwrap().processed.len(), 10);

    let root = dir.path().join("processed/orange_cats_dataset");
    let counts: Vec<usize> = ["train", "val", "test"]
        .iter()
        .map(|split| files_in(&root.join(split).join("orange_cats")).len())
        .collect();
    assert_eq!(counts, vec![7, 1, 2]);

    for split in ["train", "val", "test"] {
        for file in files_in(&root.join(split).join("orange_cats")) {
            assert_eq!(image::open(&file).unwrap().dimensions(), (64, 64));
        }
    }

    let json = fs::read_to_string(root.join("dataset_info.json")).unwrap();
    let metadata: DatasetMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(metadata.statistics.total_images, 10);
    assert_eq!(metadata.statistics.categories, vec!["orange_cats"]);
    assert_eq!(metadata.source, "memory");
    assert_eq!(metadata.generation_info.unwrap().random_seed, 7);
    assert!(root.join("README.md").exists());

    // temporary directories are removed after success
    assert!(!result.raw_dir.exists());
    assert!(!result.processed_dir.exists());
}

#[test]
fn same_seed_reproduces_assignment() {
    let names_for = |seed: u64| {
        let dir = TempDir::new().unwrap();
        let pipeline =
            Pipeline::new(config_in(dir.path(), 32, seed), MemorySource::with_images(12, 120)).unwrap();
        let result = pipeline.generate(&request_in(dir.path(), 12));
        assert!(result.success);

        let train = dir.path().join("processed/orange_cats_dataset/train/orange_cats");
        files_in(&train)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
    };

    assert_eq!(names_for(11), names_for(11));
}

#[test]
fn keeps_temp_dirs_on_request() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_in(dir.path(), 32, 42), MemorySource::with_images(4, 110)).unwrap();

    let request = DatasetRequest {
        keep_temp_files: true,
        ..request_in(dir.path(), 4)
    };
    let result = pipeline.generate(&request);

    assert!(result.success);
    assert_eq!(files_in(&result.raw_dir).len(), 4);
    assert_eq!(files_in(&result.processed_dir).len(), 4);
}

#[test]
fn bad_payload_is_counted_and_skipped() {
    let dir = TempDir::new().unwrap();
    let mut source = MemorySource::with_images(10, 120);
    source.images[4] = b"<html>rate limited</html>".to_vec();
    let pipeline = Pipeline::new(config_in(dir.path(), 64, 7), source).unwrap();

    let result = pipeline.generate(&request_in(dir.path(), 10));

    assert!(result.success);
    let download = result.stages.download.unwrap();
    assert_eq!(download.downloaded.len(), 9);
    assert_eq!(download.failed, 1);
    assert_eq!(result.stages.organize.unwrap().total_images, 9);
    assert_eq!(result.stages.metadata.unwrap().total_images, 9);
}

#[test]
fn empty_source_halts_pipeline() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_in(dir.path(), 64, 7), MemorySource { images: Vec::new() }).unwrap();

    let result = pipeline.generate(&request_in(dir.path(), 10));

    assert!(!result.success);
    let failure = result.failure.unwrap();
    assert_eq!(failure.stage, PipelineStage::Download);
    assert_eq!(failure.reason, FailureReason::SourceReturnedNothing);
    assert!(result.error.is_some());
    assert!(result.output_directory.is_none());
}

#[test]
fn undersized_images_halt_at_processing() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_in(dir.path(), 64, 7), MemorySource::with_images(5, 20)).unwrap();

    let result = pipeline.generate(&request_in(dir.path(), 5));

    assert!(!result.success);
    let failure = result.failure.unwrap();
    assert_eq!(failure.stage, PipelineStage::Process);
    assert_eq!(failure.reason, FailureReason::AllImagesRejected);
    assert!(result.stages.organize.is_none());
    assert!(!dir.path().join("processed/orange_cats_dataset").exists());
}

#[test]
fn blank_dataset_name_leaves_sibling_datasets_alone() {
    let dir = TempDir::new().unwrap();
    let earlier = dir.path().join("processed/earlier_dataset");
    fs::create_dir_all(&earlier).unwrap();
    fs::write(earlier.join("keep.txt"), b"keep").unwrap();
    let pipeline = Pipeline::new(config_in(dir.path(), 32, 7), MemorySource::with_images(3, 110)).unwrap();

    for name in ["   ", "", "..", "a/b"] {
        let request = DatasetRequest {
            output_base_dir: dir.path().join("processed"),
            ..DatasetRequest::new("cats", 3, name)
        };
        let result = pipeline.generate(&request);

        assert!(!result.success, "name {:?} was accepted", name);
        let failure = result.failure.unwrap();
        assert_eq!(failure.stage, PipelineStage::Download);
        assert!(matches!(failure.reason, FailureReason::Error(_)));
        assert!(result.stages.download.is_none());
    }

    assert!(earlier.join("keep.txt").exists());
    assert!(!dir.path().join("temp").exists());
}

#[test]
fn repeated_runs_use_separate_temp_dirs() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_in(dir.path(), 32, 7), MemorySource::with_images(3, 110)).unwrap();
    let request = DatasetRequest {
        keep_temp_files: true,
        ..request_in(dir.path(), 3)
    };

    let first = pipeline.generate(&request);
    let second = pipeline.generate(&request);

    assert!(first.success && second.success);
    assert_ne!(first.raw_dir, second.raw_dir);
    assert_eq!(files_in(&second.raw_dir).len(), 3);
    assert_eq!(second.stages.organize.unwrap().total_images, 3);
}
