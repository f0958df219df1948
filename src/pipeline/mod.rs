pub mod artifact;
pub mod cleaning;
pub mod coerce;
pub mod preprocess;
pub mod regressor;

use std::sync::Arc;

use crate::error::PipelineError;
use crate::models::request::DeliveryRequest;

pub use artifact::ModelPipeline;
pub use cleaning::{Cleaner, DeliveryCleaner};

/// Anything that can score a validated request. The HTTP layer only sees
/// this trait.
#[cfg_attr(test, mockall::automock)]
pub trait Predictor: Send + Sync {
    fn predict(&self, request: &DeliveryRequest) -> Result<f64, PipelineError>;
}

/// coerce → clean → preprocess → regress, with no shared mutable state.
pub struct InferencePipeline {
    model: Arc<ModelPipeline>,
    cleaner: Arc<dyn Cleaner>,
}

impl InferencePipeline {
    pub fn new(model: Arc<ModelPipeline>, cleaner: Arc<dyn Cleaner>) -> Self {
        Self { model, cleaner }
    }

    pub fn with_default_cleaner(model: Arc<ModelPipeline>) -> Self {
        Self::new(model, Arc::new(DeliveryCleaner::default()))
    }
}

impl Predictor for InferencePipeline {
    fn predict(&self, request: &DeliveryRequest) -> Result<f64, PipelineError> {
        let record = coerce::coerce_numeric(request.to_record());
        let cleaned = self.cleaner.clean(&record)?;
        let features = self.model.preprocessor.transform(&cleaned)?;
        Ok(self.model.regressor.predict(&features)?)
    }
}
