//! README rendering for a generated dataset

use std::fmt::Write;

use super::metadata::DatasetMetadata;
use crate::dataset::SplitName;
use crate::utils::percentage;

const USAGE: &str = r#"## Usage

The layout follows the common one-folder-per-class convention, so most
frameworks can load it directly.

### PyTorch

```python
from torchvision import datasets, transforms

transform = transforms.Compose([
    transforms.Resize((224, 224)),
    transforms.ToTensor(),
])

train_dataset = datasets.ImageFolder('train/', transform=transform)
val_dataset = datasets.ImageFolder('val/', transform=transform)
test_dataset = datasets.ImageFolder('test/', transform=transform)
```

### TensorFlow

```python
import tensorflow as tf

train_ds = tf.keras.preprocessing.image_dataset_from_directory(
    'train/', image_size=(224, 224), batch_size=32
)
```

## Metadata

For per-image details see `dataset_info.json`.
"#;

fn title_case(split: SplitName) -> &'static str {
    match split {
        SplitName::Train => "Train",
        SplitName::Val => "Val",
        SplitName::Test => "Test",
    }
}

/// Render `README.md` for a dataset
pub fn render(metadata: &DatasetMetadata) -> String {
    let mut out = String::new();
    let stats = &metadata.statistics;

    let description = if metadata.description.is_empty() {
        "No description provided"
    } else {
        &metadata.description
    };

    // Writing into a String cannot fail
    let _ = writeln!(out, "# {}\n", metadata.dataset_name);
    let _ = writeln!(out, "## Description\n\n{}\n", description);
    let _ = writeln!(out, "## Dataset Information\n");
    let _ = writeln!(out, "- **Source**: {}", metadata.source);
    let _ = writeln!(out, "- **Created**: {}", metadata.created_at);
    let _ = writeln!(out, "- **Total Images**: {}", stats.total_images);
    let _ = writeln!(out, "- **Total Size**: {} MB", stats.total_size_mb);
    let _ = writeln!(out, "- **Categories**: {}", stats.categories.join(", "));
    if let Some(info) = &metadata.generation_info {
        let _ = writeln!(out, "- **Query**: {}", info.query);
        let _ = writeln!(
            out,
            "- **Image Size**: {} (JPEG quality {})",
            info.processing.target_size, info.processing.quality
        );
        let _ = writeln!(out, "- **Random Seed**: {}", info.random_seed);
    }

    let _ = writeln!(out, "\n## Dataset Structure\n\n```");
    out.push_str(&render_tree(metadata));
    let _ = writeln!(out, "```\n\n## Split Distribution\n");

    for (split, data) in metadata.splits.iter() {
        let _ = writeln!(
            out,
            "- **{}**: {} images ({:.1}%)",
            title_case(split),
            data.total_images,
            percentage(data.total_images, stats.total_images)
        );
    }

    let _ = writeln!(out, "\n## Categories\n");
    for category in &stats.categories {
        let _ = writeln!(out, "### {}\n", category);
        for (split, data) in metadata.splits.iter() {
            if let Some(cat) = data.categories.get(category) {
                let dims = cat.statistics.average_dimensions;
                let _ = writeln!(
                    out,
                    "- **{}**: {} images (avg: {}x{})",
                    title_case(split),
                    cat.statistics.count,
                    dims.width,
                    dims.height
                );
            }
        }
        out.push('\n');
    }

    out.push_str(USAGE);
    out
}

/// Directory tree with per-category image counts
pub fn render_tree(metadata: &DatasetMetadata) -> String {
    let mut out = format!("{}/\n", metadata.dataset_name);

    for split in SplitName::ALL {
        let last_split = split == SplitName::Test;
        let _ = writeln!(out, "{} {}/", if last_split { "└──" } else { "├──" }, split);

        let Some(data) = metadata.splits.get(split) else {
            continue;
        };
        let indent = if last_split { "    " } else { "│   " };
        let n = data.categories.len();
        for (i, (name, cat)) in data.categories.iter().enumerate() {
            let branch = if i + 1 == n { "└──" } else { "├──" };
            let _ = writeln!(
                out,
                "{}{} {}/ ({} images)",
                indent, branch, name, cat.statistics.count
            );
        }
    }

    out
}
