//! Loading of the persisted preprocessor and regressor.

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::ArtifactLoadError;
use crate::pipeline::preprocess::Preprocessor;
use crate::pipeline::regressor::Regressor;

/// Fitted preprocessor and regressor, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct ModelPipeline {
    pub preprocessor: Preprocessor,
    pub regressor: Regressor,
}

/// Identity of an artifact as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: usize,
}

impl ModelPipeline {
    /// Validates both parts and checks that the preprocessor output feeds
    /// the regressor input.
    pub fn new(preprocessor: Preprocessor, regressor: Regressor) -> Result<Self, ArtifactLoadError> {
        Self::assemble(
            preprocessor,
            regressor,
            Path::new("<in-memory regressor>"),
            Path::new("<in-memory preprocessor>"),
        )
    }

    pub async fn load(model_path: &Path, preprocessor_path: &Path) -> Result<Self, ArtifactLoadError> {
        let (regressor, model_info) = read_artifact::<Regressor>(model_path).await?;
        let (preprocessor, preprocessor_info) = read_artifact::<Preprocessor>(preprocessor_path).await?;

        let pipeline = Self::assemble(preprocessor, regressor, model_path, preprocessor_path)?;

        for info in [&model_info, &preprocessor_info] {
            tracing::info!(
                path = %info.path.display(),
                sha256 = %info.sha256,
                bytes = info.bytes,
                "Loaded model artifact"
            );
        }
        tracing::debug!(
            features = ?pipeline.preprocessor.feature_names(),
            "Preprocessor feature layout"
        );
        Ok(pipeline)
    }

    fn assemble(
        preprocessor: Preprocessor,
        regressor: Regressor,
        model_path: &Path,
        preprocessor_path: &Path,
    ) -> Result<Self, ArtifactLoadError> {
        regressor.validate().map_err(|reason| ArtifactLoadError::Invalid {
            path: model_path.to_path_buf(),
            reason,
        })?;
        preprocessor.validate().map_err(|reason| ArtifactLoadError::Invalid {
            path: preprocessor_path.to_path_buf(),
            reason,
        })?;

        let produced = preprocessor.n_features_out();
        let expected = regressor.n_features();
        if produced != expected {
            return Err(ArtifactLoadError::Incompatible {
                preprocessor: produced,
                regressor: expected,
            });
        }
        Ok(Self {
            preprocessor,
            regressor,
        })
    }
}

async fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<(T, ArtifactInfo), ArtifactLoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ArtifactLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_slice(&bytes).map_err(|source| ArtifactLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let info = ArtifactInfo {
        path: path.to_path_buf(),
        sha256: sha256_hex(&bytes),
        bytes: bytes.len(),
    };
    Ok((value, info))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
