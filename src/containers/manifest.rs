// Label manifest - crowd-sourced vocals labels from a CSV export
//
// The export carries many columns; only the ones whose header contains
// `Input.filename` and `Answer.label` matter. A label containing
// `has-vocals` maps to 1.0 and one containing `no-vocals` maps to 0.0.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::PipelineError;

const FILENAME_HEADER: &str = "Input.filename";
const LABEL_HEADER: &str = "Answer.label";
const HAS_VOCALS: &str = "has-vocals";
const NO_VOCALS: &str = "no-vocals";

/// Vocals label per audio file name
#[derive(Debug, Clone, Default)]
pub struct LabelManifest {
    labels: HashMap<String, f64>,
}

impl LabelManifest {
    /// Parse a manifest CSV file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|err| PipelineError::unavailable(path.display().to_string(), err.to_string()))?;
        let manifest = Self::parse(reader)?;
        tracing::info!(
            "[Manifest] Loaded {} labels from {}",
            manifest.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Parse manifest CSV from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        Self::parse(csv::ReaderBuilder::new().flexible(true).from_reader(reader))
    }

    fn parse<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, PipelineError> {
        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .enumerate()
                .filter(|(_, header)| header.contains(name))
                .map(|(idx, _)| idx)
                .last()
        };
        let (filename_idx, label_idx) = match (column(FILENAME_HEADER), column(LABEL_HEADER)) {
            (Some(filename), Some(label)) => (filename, label),
            _ => {
                return Err(PipelineError::malformed(format!(
                    "label manifest needs columns containing {:?} and {:?}",
                    FILENAME_HEADER, LABEL_HEADER
                )))
            }
        };

        let mut labels = HashMap::new();
        for (row, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!("[Manifest] Skipping unreadable row {}: {}", row + 2, err);
                    continue;
                }
            };
            let (Some(filename), Some(label)) = (record.get(filename_idx), record.get(label_idx))
            else {
                tracing::warn!("[Manifest] Skipping short row {}", row + 2);
                continue;
            };

            let filename = filename.trim().trim_matches('"');
            match parse_label(label) {
                Some(value) => {
                    tracing::debug!("[Manifest] {} -> {}", filename, value);
                    labels.insert(filename.to_string(), value);
                }
                None => tracing::warn!(
                    "[Manifest] No vocals label for {} (got {:?})",
                    filename,
                    label
                ),
            }
        }

        Ok(Self { labels })
    }

    /// Label for an audio file, looked up by its stem (name without extension)
    ///
    /// Manifest entries may be listed with or without an extension.
    pub fn label_for(&self, stem: &str) -> Option<f64> {
        self.labels.get(stem).copied().or_else(|| {
            self.labels
                .iter()
                .find(|(name, _)| {
                    Path::new(name.as_str())
                        .file_stem()
                        .is_some_and(|candidate| candidate == stem)
                })
                .map(|(_, &label)| label)
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn parse_label(label: &str) -> Option<f64> {
    if label.contains(HAS_VOCALS) {
        Some(1.0)
    } else if label.contains(NO_VOCALS) {
        Some(0.0)
    } else {
        None
    }
}
