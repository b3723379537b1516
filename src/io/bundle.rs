//! Model bundle JSON.
//!
//! The bundle is the portable result of a run:
//! - the configuration the models were trained with
//! - the fitted feature encoder (stored once, shared by every model on load)
//! - every fitted estimator with its training metrics
//! - the evaluator's ranking, best first
//!
//! `cy predict` reads a bundle and never refits.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Metrics, ModelKind, PipelineConfig};
use crate::error::PipelineError;
use crate::fit::{Comparison, ModelHandle};
use crate::models::{Estimator, FeatureEncoder};
use crate::predictor::Predictor;

pub const BUNDLE_TOOL: &str = "cy";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    pub name: String,
    pub kind: ModelKind,
    pub estimator: Estimator,
    /// In-sample metrics.
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub tool: String,
    pub config: PipelineConfig,
    pub encoder: FeatureEncoder,
    pub models: Vec<StoredModel>,
    /// Model names, best first.
    pub ranking: Vec<String>,
}

impl ModelBundle {
    /// Capture fitted handles (which must share one encoder) and their ranking.
    pub fn new(config: &PipelineConfig, handles: &[ModelHandle], comparison: &Comparison) -> Result<Self, PipelineError> {
        let first = handles
            .first()
            .ok_or_else(|| PipelineError::Fit("no fitted models to store".into()))?;
        if handles.iter().any(|h| !Arc::ptr_eq(&h.encoder, &first.encoder)) {
            return Err(PipelineError::Fit("fitted models do not share one encoder".into()));
        }

        Ok(Self {
            tool: BUNDLE_TOOL.to_string(),
            config: config.clone(),
            encoder: first.encoder.as_ref().clone(),
            models: handles
                .iter()
                .map(|h| StoredModel {
                    name: h.name.clone(),
                    kind: h.kind,
                    estimator: h.estimator.clone(),
                    metrics: h.metrics,
                })
                .collect(),
            ranking: comparison.ranked_names(),
        })
    }

    /// Rebuild handles that share a single encoder.
    pub fn handles(&self) -> Vec<ModelHandle> {
        let encoder = Arc::new(self.encoder.clone());
        self.models
            .iter()
            .map(|m| ModelHandle {
                name: m.name.clone(),
                kind: m.kind,
                estimator: m.estimator.clone(),
                encoder: Arc::clone(&encoder),
                metrics: m.metrics,
            })
            .collect()
    }

    pub fn into_predictor(self) -> Result<Predictor, PipelineError> {
        let handles = self.handles();
        Predictor::from_ranking(handles, self.ranking)
    }
}

pub fn write_bundle<W: Write>(writer: W, bundle: &ModelBundle) -> Result<(), PipelineError> {
    serde_json::to_writer_pretty(writer, bundle)
        .map_err(|e| PipelineError::Data(format!("failed to write model bundle: {e}")))
}

pub fn read_bundle<R: Read>(reader: R) -> Result<ModelBundle, PipelineError> {
    let bundle: ModelBundle = serde_json::from_reader(reader)
        .map_err(|e| PipelineError::Schema(format!("invalid model bundle JSON: {e}")))?;
    if bundle.models.is_empty() {
        return Err(PipelineError::Schema("model bundle contains no models".into()));
    }
    let width = bundle.encoder.width();
    for m in &bundle.models {
        m.estimator
            .check_width(width)
            .map_err(|e| PipelineError::Schema(format!("model '{}' does not match the encoder: {e}", m.name)))?;
    }
    Ok(bundle)
}

pub fn write_bundle_file(path: &Path, bundle: &ModelBundle) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    write_bundle(file, bundle).map_err(|e| PipelineError::io(path, e))
}

pub fn read_bundle_file(path: &Path) -> Result<ModelBundle, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    read_bundle(file)
}
