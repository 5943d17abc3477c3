use std::time::Instant;

use ndarray::ArrayD;

use crate::common::Result;
use crate::inference_runners::input_wrapper::X;
use crate::utils;

pub trait InferenceProcess {
    type Input;
    type Output;

    /// Pre-process the input data.
    fn preprocess(&self, input: &Self::Input) -> Result<X>;

    /// Executes the model on the preprocessed data.
    fn inference(&self, x: X) -> Result<ArrayD<f32>>;

    /// Post-process the model's output.
    fn postprocess(&self, ys: ArrayD<f32>, input: &Self::Input) -> Result<Self::Output>;

    /// Executes the full pipeline.
    fn run(&self, input: &Self::Input) -> Result<Self::Output> {
        let x = self.preprocess(input)?;
        let ys = self.inference(x)?;
        self.postprocess(ys, input)
    }

    /// Executes the full pipeline, tracing each stage.
    fn forward(&self, input: &Self::Input, profile: bool) -> Result<Self::Output> {
        let start = Instant::now();

        let x = self.preprocess(input)?;
        let t_pre = start.elapsed();
        let mut elapsed = utils::trace("TIME", "Preprocessing input", start, Default::default());

        let ys = self.inference(x)?;
        let t_exe = start.elapsed() - t_pre;
        elapsed = utils::trace("TIME", "Inference run", start, elapsed);

        let output = self.postprocess(ys, input)?;
        let t_post = start.elapsed() - t_pre - t_exe;
        utils::trace("TIME", "Postprocessing", start, elapsed);

        if profile {
            log::info!("> Preprocess: {t_pre:?} | Inference: {t_exe:?} | Postprocess: {t_post:?}");
        }

        Ok(output)
    }
}
