//! Separation model capability.
//!
//! The model is an opaque collaborator: it receives one `(1, frames, bins, 2)` tensor of
//! mixture magnitudes and must return one tensor of the same shape per stem.

use anyhow::Result;
use ndarray::Array4;

use crate::types::StemCount;

#[cfg(feature = "onnx")]
pub mod onnx;

pub trait Separator {
    /// Stem count this model was loaded for.
    fn stems(&self) -> StemCount;

    /// Run one patch through the model. Called once per patch, in patch order.
    fn separate(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>>;
}

/// Loads the model for a stem count.
pub type ModelLoader = Box<dyn FnMut(StemCount) -> Result<Box<dyn Separator>>>;
