pub mod decode;
pub mod error;
pub mod nms;

use serde::{Deserialize, Serialize};

use crate::decode::GridDecoder;
use crate::error::DetectError;

/// Prior box template in grid-cell units, fixed per model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Anchor {
    pub width: f32,
    pub height: f32,
}

/// One labeled box. Geometry is normalized to the image: left/top/width/height
/// in 0..1, confidence = objectness * class probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Raw network output laid out row-major as (height, width, channels),
/// channels = num_anchors * (5 + num_classes).
#[derive(Debug, Clone)]
pub struct GridTensor {
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
}

impl GridTensor {
    pub fn new(
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self, DetectError> {
        let expected = height * width * channels;
        if data.len() != expected {
            return Err(DetectError::ShapeMismatch {
                expected: format!("{} values for {}x{}x{}", expected, height, width, channels),
                got: format!("{} values", data.len()),
            });
        }
        Ok(Self { height, width, channels, data })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn at(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.data[(row * self.width + col) * self.channels + channel]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub anchors: Vec<Anchor>,
    pub num_classes: usize,
    pub labels: Vec<String>,
    pub iou_threshold: f32,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default)]
    pub max_detections: Option<usize>,
}

fn default_min_confidence() -> f32 {
    1e-3
}

impl DetectorConfig {
    /// Rejects malformed configuration up front so decode never has to.
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.anchors.is_empty() {
            return Err(DetectError::Config("anchors must not be empty".into()));
        }
        if let Some(a) = self
            .anchors
            .iter()
            .find(|a| !(a.width > 0.0) || !(a.height > 0.0))
        {
            return Err(DetectError::Config(format!(
                "anchor ({}, {}) must have positive width and height",
                a.width, a.height
            )));
        }
        if self.num_classes == 0 {
            return Err(DetectError::Config("num_classes must be >= 1".into()));
        }
        if self.labels.len() != self.num_classes {
            return Err(DetectError::Config(format!(
                "labels count {} does not match num_classes {}",
                self.labels.len(),
                self.num_classes
            )));
        }
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(DetectError::Config(format!(
                "iou_threshold {} out of (0, 1]",
                self.iou_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(DetectError::Config(format!(
                "min_confidence {} out of [0, 1]",
                self.min_confidence
            )));
        }
        Ok(())
    }

    /// Channel count the raw tensor must carry.
    pub fn channels(&self) -> usize {
        self.anchors.len() * (5 + self.num_classes)
    }
}

/// Backend boundary: preprocessed input in, raw grid tensor out. Model
/// loading and execution live behind this trait; the pipeline never sees
/// backend specifics.
pub trait InferenceEngine {
    fn infer(&mut self, input: &[f32]) -> anyhow::Result<GridTensor>;
}

/// One model's decode+suppress chain. Construct per configuration; instances
/// are independent and can coexist.
pub struct DetectionPipeline<E> {
    engine: E,
    decoder: GridDecoder,
    iou_threshold: f32,
    max_detections: Option<usize>,
}

impl<E: InferenceEngine> DetectionPipeline<E> {
    pub fn new(config: DetectorConfig, engine: E) -> Result<Self, DetectError> {
        let decoder = GridDecoder::new(&config)?;
        Ok(Self {
            engine,
            decoder,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        })
    }

    /// Runs one frame through the backend and reduces the raw grid to the
    /// final detection list. Fails whole; never returns a partial list.
    pub fn detect(&mut self, input: &[f32]) -> Result<Vec<Detection>, DetectError> {
        let raw = self
            .engine
            .infer(input)
            .map_err(DetectError::Inference)?;
        let candidates = self.decoder.decode(&raw)?;
        Ok(nms::suppress(
            candidates,
            self.iou_threshold,
            self.max_detections,
        ))
    }
}
