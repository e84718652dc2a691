use serde_json::Value;

use crate::error::Result;

/// Normalized RGB pixels in row-major `(height, width, 3)` order, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl ImageTensor {
    pub const CHANNELS: usize = 3;

    pub fn new(data: Vec<f32>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * Self::CHANNELS
        );

        ImageTensor {
            data,
            width,
            height,
        }
    }

    /// `[height, width, channels]`
    pub fn shape(&self) -> [usize; 3] {
        [self.height as usize, self.width as usize, Self::CHANNELS]
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// A loaded image-classification model.
///
/// Only [`predict`](InferenceModel::predict) is required. The metadata
/// accessors are capabilities: a backend that cannot answer returns `None`
/// and callers move on to their next source of information.
///
/// The same instance serves every request concurrently. Backends whose
/// runtime cannot run inference from several threads at once must serialize
/// calls themselves.
pub trait InferenceModel: Send + Sync {
    /// Identifier reported as the model file.
    fn name(&self) -> &str;

    /// Run the model on one image and return its output row.
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>>;

    /// Output shape including the batch dimension, `None` entries are unknown.
    fn output_shape(&self) -> Option<Vec<Option<u64>>> {
        None
    }

    fn parameter_count(&self) -> Option<u64> {
        None
    }

    /// Class names stored on the model itself.
    fn class_names(&self) -> Option<Vec<String>> {
        None
    }

    /// Keras-style model config (`{"layers": [...]}`).
    fn config(&self) -> Option<&Value> {
        None
    }

    /// Number of classes the model scores, when its output shape says so.
    fn output_width(&self) -> Option<usize> {
        self.output_shape()?
            .last()
            .copied()
            .flatten()
            .map(|width| width as usize)
    }
}
