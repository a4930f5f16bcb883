//! Metadata export: `dataset_info.json` and `README.md`

pub mod metadata;
pub mod readme;

pub use metadata::{
    image_info, scan_directory, CategoryMetadata, CategoryStatistics, DatasetMetadata,
    GenerationInfo, GlobalStatistics, ImageInfo, MetadataExporter, ProcessingInfo,
    SplitMetadata, Splits,
};
