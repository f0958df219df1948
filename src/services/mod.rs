use std::sync::Arc;

use crate::config::Config;
use crate::error::ArtifactLoadError;
use crate::pipeline::{InferencePipeline, ModelPipeline, Predictor};

/// Per-process context handed to every handler. Built once, never mutated.
pub struct AppState {
    pub predictor: Arc<dyn Predictor>,
}

impl AppState {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self { predictor }
    }

    /// Loads both artifacts; the server must not start if this fails.
    pub async fn load(config: &Config) -> Result<Self, ArtifactLoadError> {
        let model = ModelPipeline::load(&config.model_path, &config.preprocessor_path).await?;
        let pipeline = InferencePipeline::with_default_cleaner(Arc::new(model));
        Ok(Self::new(Arc::new(pipeline)))
    }
}
