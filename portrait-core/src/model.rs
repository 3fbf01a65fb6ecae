use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use tract_onnx::prelude::{
    DatumExt, Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, Tensor, TypedFact,
    TypedOp, tvec,
};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded single-input ONNX graph with a fixed `f32` input shape.
///
/// Loading tries the fully optimized plan first and falls back to a decluttered graph when tract
/// cannot optimize an operator.
#[derive(Debug)]
pub struct OnnxModel {
    runnable: RunnableModel,
    input_shape: Vec<usize>,
    label: &'static str,
}

impl OnnxModel {
    /// Load `model_path`, pinning input 0 to `input_shape`. `label` names the model in logs and
    /// errors.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        label: &'static str,
        input_shape: &[usize],
    ) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(
            path.exists(),
            "{label} model file not found: {}",
            path.display()
        );
        anyhow::ensure!(
            !input_shape.is_empty() && input_shape.iter().all(|&dim| dim > 0),
            "{label} input shape must be non-empty with positive dimensions, got {input_shape:?}"
        );

        let runnable = match load_runnable_model(path, label, input_shape, true) {
            Ok(model) => {
                debug!(
                    "{label} model {} optimized for input {input_shape:?}",
                    path.display()
                );
                model
            }
            Err(opt_err) => {
                let optimize_msg = format!("{opt_err}");
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "{label} model {} failed optimized load ({optimize_msg}); using the decluttered graph instead.\nError chain:\n{}",
                    path.display(),
                    chain_msg.trim_end()
                );
                load_runnable_model(path, label, input_shape, false).with_context(|| {
                    format!(
                        "fallback to decluttered {label} graph failed after optimize error: {optimize_msg}"
                    )
                })?
            }
        };

        Ok(Self {
            runnable,
            input_shape: input_shape.to_vec(),
            label,
        })
    }

    /// Run the graph and return its first output.
    pub fn run(&self, input: Tensor) -> Result<Tensor> {
        anyhow::ensure!(
            input.shape() == self.input_shape.as_slice(),
            "{} input tensor has shape {:?}, expected {:?}",
            self.label,
            input.shape(),
            self.input_shape
        );
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("{} execution failed: {e}", self.label))?;

        outputs
            .into_iter()
            .next()
            .map(|value| value.into_tensor())
            .ok_or_else(|| anyhow::anyhow!("{} model produced no outputs", self.label))
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

fn load_runnable_model(
    path: &Path,
    label: &str,
    input_shape: &[usize],
    optimized: bool,
) -> Result<RunnableModel> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?
        .with_input_fact(0, f32::fact(input_shape.to_vec()).into())
        .map_err(|e| anyhow::anyhow!("unable to pin {label} input shape: {e}"))?;

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize {label} graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make {label} graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check {label} graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter {label} graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make {label} graph runnable: {e}"))
    }
}

/// Copy an `f32` tensor out as a flat buffer alongside its shape.
pub(crate) fn tensor_to_vec(tensor: &Tensor, label: &str) -> Result<(Vec<usize>, Vec<f32>)> {
    let data = tensor
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("{label} output is not f32: {e}"))?;
    Ok((tensor.shape().to_vec(), data.to_vec()))
}
