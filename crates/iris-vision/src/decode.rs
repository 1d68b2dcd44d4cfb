use tracing::debug;

use crate::error::DetectError;
use crate::{Anchor, Detection, DetectorConfig, GridTensor};

/// Turns one raw grid tensor into unsorted candidate boxes. Stateless after
/// construction; safe to call from independent threads on owned inputs.
pub struct GridDecoder {
    anchors: Vec<Anchor>,
    labels: Vec<String>,
    min_confidence: f32,
}

impl GridDecoder {
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectError> {
        config.validate()?;
        Ok(Self {
            anchors: config.anchors.clone(),
            labels: config.labels.clone(),
            min_confidence: config.min_confidence,
        })
    }

    /// Per cell and anchor: sigmoid on the center offsets and objectness,
    /// anchor * exp() on the size terms, softmax over the class logits. Emits
    /// one candidate per class whose objectness * probability clears
    /// min_confidence (inclusive). Output order is cell-major, anchor-minor,
    /// class-ascending.
    pub fn decode(&self, tensor: &GridTensor) -> Result<Vec<Detection>, DetectError> {
        let num_classes = self.labels.len();
        let stride = 5 + num_classes;
        let expected = self.anchors.len() * stride;
        if tensor.channels() != expected {
            return Err(DetectError::ShapeMismatch {
                expected: format!("{} channels ({} anchors x {})", expected, self.anchors.len(), stride),
                got: format!("{} channels", tensor.channels()),
            });
        }

        let grid_h = tensor.height() as f32;
        let grid_w = tensor.width() as f32;
        let mut out = Vec::new();
        let mut scores = vec![0.0f32; num_classes];

        for row in 0..tensor.height() {
            for col in 0..tensor.width() {
                for (a, anchor) in self.anchors.iter().enumerate() {
                    let base = a * stride;

                    let cx = (col as f32 + sigmoid(tensor.at(row, col, base))) / grid_w;
                    let cy = (row as f32 + sigmoid(tensor.at(row, col, base + 1))) / grid_h;
                    let w = anchor.width * tensor.at(row, col, base + 2).exp() / grid_w;
                    let h = anchor.height * tensor.at(row, col, base + 3).exp() / grid_h;
                    let objectness = sigmoid(tensor.at(row, col, base + 4));

                    // Clamp into the unit square; a zero-sized box is still a
                    // valid candidate.
                    let left = (cx - w / 2.0).clamp(0.0, 1.0);
                    let top = (cy - h / 2.0).clamp(0.0, 1.0);
                    let width = w.clamp(0.0, 1.0 - left);
                    let height = h.clamp(0.0, 1.0 - top);

                    for (k, s) in scores.iter_mut().enumerate() {
                        *s = tensor.at(row, col, base + 5 + k);
                    }
                    softmax_in_place(&mut scores);

                    for (class_id, &p) in scores.iter().enumerate() {
                        let confidence = objectness * p;
                        if confidence >= self.min_confidence {
                            out.push(Detection {
                                left,
                                top,
                                width,
                                height,
                                class_id,
                                label: self.labels[class_id].clone(),
                                confidence,
                            });
                        }
                    }
                }
            }
        }

        debug!(candidates = out.len(), "grid decode complete");
        Ok(out)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// Max-subtracted for numeric stability on large logits.
fn softmax_in_place(xs: &mut [f32]) {
    let max = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for x in xs.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    for x in xs.iter_mut() {
        *x /= sum;
    }
}
