use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use ndarray::Array4;
use once_cell::sync::OnceCell;
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::{Tensor, Value},
};
use std::path::{Path, PathBuf};

use crate::{model::Separator, types::StemCount};

static ORT_INIT: OnceCell<()> = OnceCell::new();

/// ONNX Runtime session for an exported spectrogram-mask model.
pub struct OnnxSeparator {
    session: Session,
    stems: StemCount,
    input_name: String,
}

/// `<dir>/spleeter_<n>stems.onnx`
pub fn model_path(model_dir: &Path, stems: StemCount) -> PathBuf {
    model_dir.join(format!("spleeter_{}stems.onnx", stems.count()))
}

impl OnnxSeparator {
    pub fn load(path: &Path, stems: StemCount) -> Result<Self> {
        ORT_INIT.get_or_try_init::<_, anyhow::Error>(|| {
            ort::init().commit()?;
            Ok(())
        })?;

        if !path.exists() {
            return Err(anyhow!("model file not found: {}", path.display()));
        }

        let session = SessionBuilder::new()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)
            .with_context(|| format!("failed to build session from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| anyhow!("model has no inputs"))?;

        if session.outputs.len() != stems.count() {
            return Err(anyhow!(
                "model has {} outputs, expected {}",
                session.outputs.len(),
                stems.count()
            ));
        }

        info!(
            "loaded {}-stem model from {} (input '{}')",
            stems,
            path.display(),
            input_name
        );

        Ok(Self {
            session,
            stems,
            input_name,
        })
    }
}

impl Separator for OnnxSeparator {
    fn stems(&self) -> StemCount {
        self.stems
    }

    fn separate(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        let shape = input.raw_dim();
        let dims = vec![shape[0], shape[1], shape[2], shape[3]];
        let data: Vec<f32> = input.iter().copied().collect();
        let value: Value = Tensor::from_array((dims, data))
            .context("input tensor")?
            .into_dyn();

        let output_names: Vec<String> =
            self.session.outputs.iter().map(|o| o.name.clone()).collect();

        let outputs = self
            .session
            .run(vec![(self.input_name.clone(), value)])?;

        let mut stems = Vec::with_capacity(output_names.len());
        for name in &output_names {
            let v = outputs
                .get(name.as_str())
                .ok_or_else(|| anyhow!("model did not return '{name}'"))?;
            let (_shape, data) = v.try_extract_tensor::<f32>()?;
            if data.len() != input.len() {
                return Err(anyhow!(
                    "output '{}' has {} values (expected {})",
                    name,
                    data.len(),
                    input.len()
                ));
            }
            stems.push(Array4::from_shape_vec(shape.clone(), data.to_vec())?);
        }
        debug!("onnx run produced {} outputs", stems.len());

        Ok(stems)
    }
}
