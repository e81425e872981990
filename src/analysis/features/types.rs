// Types module - the labeled feature frame and its text encoding
//
// A frame is written as one tab-separated line:
//
//   <highest derivative>\t<base length>\t<pad 0|1>\t<l0>,<l1>,...,\t<f0>,<f1>,...,\t
//
// Floats use Rust's shortest round-trip formatting, so reading a line back
// reproduces every value bit for bit.

use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Labeled feature vector produced per analysis window
///
/// `features` holds the base features followed by one block of
/// `base_feature_length` values per appended derivative order, so
/// `features.len() == base_feature_length * (highest_derivative + 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    features: Vec<f64>,
    base_feature_length: usize,
    highest_derivative: usize,
    labels: Vec<f64>,
    is_pad: bool,
}

impl FeatureFrame {
    /// Create a frame with no derivatives appended
    pub fn new(features: Vec<f64>, labels: Vec<f64>) -> Self {
        Self {
            base_feature_length: features.len(),
            features,
            highest_derivative: 0,
            labels,
            is_pad: false,
        }
    }

    /// Rebuild a frame from its stored parts, checking the length invariant
    pub fn from_parts(
        features: Vec<f64>,
        base_feature_length: usize,
        highest_derivative: usize,
        labels: Vec<f64>,
        is_pad: bool,
    ) -> Result<Self, PipelineError> {
        let expected = base_feature_length * (highest_derivative + 1);
        if features.len() != expected {
            return Err(PipelineError::malformed(format!(
                "frame holds {} features, expected {} (base {} x {} blocks)",
                features.len(),
                expected,
                base_feature_length,
                highest_derivative + 1
            )));
        }
        Ok(Self {
            features,
            base_feature_length,
            highest_derivative,
            labels,
            is_pad,
        })
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn base_feature_length(&self) -> usize {
        self.base_feature_length
    }

    pub fn highest_derivative(&self) -> usize {
        self.highest_derivative
    }

    /// Synthetic boundary frame that must never reach a consumer
    pub fn is_pad(&self) -> bool {
        self.is_pad
    }

    /// Copy of this frame marked as a pad
    pub fn to_pad(&self) -> Self {
        Self {
            is_pad: true,
            ..self.clone()
        }
    }

    /// Replace the feature vector after appending derivative block `order`
    ///
    /// `features` must hold `order + 1` blocks of the base length.
    pub(crate) fn set_derivatives(&mut self, features: Vec<f64>, order: usize) {
        debug_assert_eq!(features.len(), self.base_feature_length * (order + 1));
        self.features = features;
        self.highest_derivative = order;
    }

    /// Encode as a single line (without the trailing newline)
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// Decode a line written by [`FeatureFrame::to_line`]
    pub fn from_line(line: &str) -> Result<Self, PipelineError> {
        line.parse()
    }
}

impl fmt::Display for FeatureFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t",
            self.highest_derivative,
            self.base_feature_length,
            u8::from(self.is_pad)
        )?;
        for label in &self.labels {
            write!(f, "{},", label)?;
        }
        f.write_str("\t")?;
        for feature in &self.features {
            write!(f, "{},", feature)?;
        }
        f.write_str("\t")
    }
}

impl FromStr for FeatureFrame {
    type Err = PipelineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');
        let mut field = |name: &str| {
            fields
                .next()
                .ok_or_else(|| PipelineError::malformed(format!("missing {} field", name)))
        };

        let highest_derivative = parse_usize(field("derivative order")?, "derivative order")?;
        let base_feature_length = parse_usize(field("base length")?, "base length")?;
        let is_pad = match field("pad flag")?.trim() {
            "0" => false,
            "1" => true,
            other => {
                return Err(PipelineError::malformed(format!(
                    "pad flag must be 0 or 1, got {:?}",
                    other
                )))
            }
        };
        let labels = parse_list(field("labels")?)?;
        let features = parse_list(field("features")?)?;

        Self::from_parts(
            features,
            base_feature_length,
            highest_derivative,
            labels,
            is_pad,
        )
    }
}

fn parse_usize(text: &str, name: &str) -> Result<usize, PipelineError> {
    text.trim()
        .parse()
        .map_err(|_| PipelineError::malformed(format!("invalid {} {:?}", name, text)))
}

fn parse_list(text: &str) -> Result<Vec<f64>, PipelineError> {
    text.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            piece
                .parse::<f64>()
                .map_err(|_| PipelineError::malformed(format!("invalid number {:?}", piece)))
        })
        .collect()
}
