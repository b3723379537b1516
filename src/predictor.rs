//! Prediction entry point for consumers of the fitted models.
//!
//! A [`Predictor`] holds the fitted handles plus the evaluator's ranking. It
//! never carries an implicit "current model": callers either name a model or
//! get the top-ranked one, and [`predict_with`] accepts an explicit handle.

use tracing::warn;

use crate::domain::normalize_state;
use crate::error::PipelineError;
use crate::fit::bank::ModelHandle;
use crate::fit::selection::Comparison;

/// User-supplied inputs for one estimate. No field has a default.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub state: String,
    pub year: i32,
    /// Growing-season mean temperature (°C).
    pub avg_temperature: f64,
    /// Growing-season total rainfall (mm).
    pub total_rainfall: f64,
}

impl PredictionRequest {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if normalize_state(&self.state).is_empty() {
            return Err(PipelineError::Validation("state must not be empty".into()));
        }
        if !self.avg_temperature.is_finite() {
            return Err(PipelineError::Validation(format!(
                "average temperature must be finite, got {}",
                self.avg_temperature
            )));
        }
        if !self.total_rainfall.is_finite() {
            return Err(PipelineError::Validation(format!(
                "total rainfall must be finite, got {}",
                self.total_rainfall
            )));
        }
        if self.total_rainfall < 0.0 {
            return Err(PipelineError::Validation(format!(
                "total rainfall must be >= 0, got {}",
                self.total_rainfall
            )));
        }
        Ok(())
    }
}

/// A point estimate and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub yield_bu_per_acre: f64,
    pub model: String,
    /// `false` when the state was absent from training and encoded as unknown.
    pub known_state: bool,
}

/// Predict with an explicitly chosen handle.
pub fn predict_with(handle: &ModelHandle, request: &PredictionRequest) -> Result<Prediction, PipelineError> {
    request.validate()?;

    let known_state = handle.encoder.is_known_state(&request.state);
    if !known_state {
        warn!(state = %request.state, "state not seen in training; using unknown-state encoding");
    }

    let value = handle.predict(
        &request.state,
        request.year,
        request.avg_temperature,
        request.total_rainfall,
    );
    if !value.is_finite() {
        return Err(PipelineError::Validation(format!(
            "{} produced a non-finite estimate for this request",
            handle.name
        )));
    }

    Ok(Prediction {
        yield_bu_per_acre: value,
        model: handle.name.clone(),
        known_state,
    })
}

/// Fitted models plus the order in which to prefer them.
#[derive(Debug, Clone)]
pub struct Predictor {
    handles: Vec<ModelHandle>,
    ranking: Vec<String>,
}

impl Predictor {
    /// Build from the bank's handles and the evaluator's comparison table.
    pub fn new(handles: Vec<ModelHandle>, comparison: &Comparison) -> Result<Self, PipelineError> {
        Self::from_ranking(handles, comparison.ranked_names())
    }

    /// Build from handles and model names in preference order (best first).
    pub fn from_ranking(handles: Vec<ModelHandle>, ranking: Vec<String>) -> Result<Self, PipelineError> {
        if ranking.is_empty() {
            return Err(PipelineError::Validation("predictor needs at least one ranked model".into()));
        }
        if let Some(missing) = ranking.iter().find(|name| !handles.iter().any(|h| &h.name == *name)) {
            return Err(PipelineError::Validation(format!("ranked model '{missing}' has no fitted handle")));
        }
        Ok(Self { handles, ranking })
    }

    pub fn handles(&self) -> &[ModelHandle] {
        &self.handles
    }

    pub fn ranking(&self) -> &[String] {
        &self.ranking
    }

    pub fn handle(&self, name: &str) -> Option<&ModelHandle> {
        self.handles.iter().find(|h| h.name == name)
    }

    /// The evaluator's top-ranked model.
    pub fn default_handle(&self) -> &ModelHandle {
        // Every ranked name was checked against the handles at construction.
        self.handles
            .iter()
            .find(|h| h.name == self.ranking[0])
            .unwrap_or(&self.handles[0])
    }

    /// `predict(state, year, avg_temperature, total_rainfall, model_name) -> yield`.
    pub fn predict(
        &self,
        state: &str,
        year: i32,
        avg_temperature: f64,
        total_rainfall: f64,
        model_name: Option<&str>,
    ) -> Result<f64, PipelineError> {
        let request = PredictionRequest {
            state: state.to_string(),
            year,
            avg_temperature,
            total_rainfall,
        };
        Ok(self.predict_request(&request, model_name)?.yield_bu_per_acre)
    }

    pub fn predict_request(
        &self,
        request: &PredictionRequest,
        model_name: Option<&str>,
    ) -> Result<Prediction, PipelineError> {
        let handle = match model_name {
            Some(name) => self.handle(name).ok_or_else(|| {
                PipelineError::Validation(format!(
                    "unknown model '{name}' (available: {})",
                    self.ranking.join(", ")
                ))
            })?,
            None => self.default_handle(),
        };
        predict_with(handle, request)
    }
}
