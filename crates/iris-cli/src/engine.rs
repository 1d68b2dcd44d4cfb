use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use iris_vision::{GridTensor, InferenceEngine};
use tracing::debug;

/// Stand-in inference backend: serves a raw output tensor from a
/// little-endian f32 dump on disk instead of running a model. The
/// preprocessed input is ignored; the dump already is the model's answer.
pub struct TensorFileEngine {
    path: PathBuf,
    grid_height: usize,
    grid_width: usize,
    channels: usize,
}

impl TensorFileEngine {
    pub fn new(path: impl AsRef<Path>, grid_height: usize, grid_width: usize, channels: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            grid_height,
            grid_width,
            channels,
        }
    }
}

impl InferenceEngine for TensorFileEngine {
    fn infer(&mut self, _input: &[f32]) -> Result<GridTensor> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read tensor dump {}", self.path.display()))?;
        anyhow::ensure!(
            bytes.len() % 4 == 0,
            "tensor dump {} is not a whole number of f32 values",
            self.path.display()
        );

        let data: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        debug!(values = data.len(), "tensor dump loaded");

        Ok(GridTensor::new(self.grid_height, self.grid_width, self.channels, data)?)
    }
}
