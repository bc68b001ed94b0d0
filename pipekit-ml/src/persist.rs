//! Model and pipeline files.
//!
//! Both are written as a pretty-printed JSON envelope:
//!
//! ```json
//! {
//!   "format": "PIPEKIT_MODEL_V1",
//!   "model_type": "anbc",
//!   "checksum": "<sha256 of the compact payload JSON>",
//!   "payload": { ... }
//! }
//! ```
//!
//! The checksum is verified on load, so a truncated or hand-edited file is
//! reported as a [`MlError::Model`] rather than deserialized into a model
//! with silently wrong parameters.

use crate::error::{MlError, Result};
use pipekit_core::CoreError;
use pipekit_core::persistence::{atomic_write_json, load_json, sha256_hex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MODEL_FORMAT: &str = "PIPEKIT_MODEL_V1";
pub const PIPELINE_FORMAT: &str = "PIPEKIT_PIPELINE_V1";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: String,
    model_type: String,
    checksum: String,
    payload: serde_json::Value,
}

fn payload_checksum(payload: &serde_json::Value) -> Result<String> {
    Ok(sha256_hex(serde_json::to_string(payload)?.as_bytes()))
}

/// Wrap `value` in an envelope tagged `format` / `model_type` and write it atomically.
pub(crate) fn write_envelope<T: Serialize>(
    path: &Path,
    format: &str,
    model_type: &str,
    value: &T,
) -> Result<()> {
    let payload = serde_json::to_value(value)?;
    let envelope = Envelope {
        format: format.to_string(),
        model_type: model_type.to_string(),
        checksum: payload_checksum(&payload)?,
        payload,
    };
    atomic_write_json(path, &envelope)?;
    tracing::debug!(path = %path.display(), format, model_type, "saved envelope");
    Ok(())
}

/// Read an envelope written by [`write_envelope`], verifying format and
/// checksum. Returns the recorded model type with the payload.
pub(crate) fn read_envelope<T: DeserializeOwned>(path: &Path, format: &str) -> Result<(String, T)> {
    let envelope: Option<Envelope> = load_json(path).map_err(|e| match e {
        CoreError::Serialization(e) => {
            MlError::model(format!("{}: not a valid model file: {e}", path.display()))
        }
        other => other.into(),
    })?;
    let envelope = envelope.ok_or_else(|| {
        MlError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        ))
    })?;

    if envelope.format != format {
        return Err(MlError::model(format!(
            "{}: expected format {format}, found {}",
            path.display(),
            envelope.format
        )));
    }
    let checksum = payload_checksum(&envelope.payload)?;
    if checksum != envelope.checksum {
        return Err(MlError::model(format!(
            "{}: checksum mismatch, file is corrupted or was edited",
            path.display()
        )));
    }

    let value = serde_json::from_value(envelope.payload).map_err(|e| {
        MlError::model(format!("{}: invalid {} payload: {e}", path.display(), envelope.model_type))
    })?;
    Ok((envelope.model_type, value))
}

/// Save/load for any serializable model.
///
/// Prediction caches are not persisted; a reloaded model predicts exactly
/// what the saved one did for the same input.
pub trait ModelPersistence: Serialize + DeserializeOwned + Sized {
    /// Identifier written into the envelope's `model_type` field.
    fn persisted_type(&self) -> &'static str;

    fn save_model_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        write_envelope(path.as_ref(), MODEL_FORMAT, self.persisted_type(), self)
    }

    fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (model_type, model): (String, Self) = read_envelope(path, MODEL_FORMAT)?;
        if model.persisted_type() != model_type {
            return Err(MlError::model(format!(
                "{}: header says {model_type} but payload is {}",
                path.display(),
                model.persisted_type()
            )));
        }
        Ok(model)
    }

    /// Replace `self` with the model stored at `path`. The stored model
    /// must be of the same type; on error `self` is left unchanged.
    fn load_model_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let loaded = Self::from_file(path)?;
        if loaded.persisted_type() != self.persisted_type() {
            return Err(MlError::model(format!(
                "{}: cannot load a {} model into a {}",
                path.display(),
                loaded.persisted_type(),
                self.persisted_type()
            )));
        }
        *self = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ClassificationData, RegressionData};
    use crate::models::{Anbc, Classifier, LinearRegression, Regressifier};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn line() -> RegressionData {
        let mut data = RegressionData::new(1, 1);
        for i in 0..10 {
            let x = f64::from(i) / 3.0;
            data.add_sample(vec![x], vec![0.7 * x - 0.1]).unwrap();
        }
        data
    }

    #[test]
    fn test_model_round_trip_preserves_predictions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linear.json");

        let mut model = LinearRegression::new().with_scaling(true);
        model.train(&line()).unwrap();
        model.save_model_to_file(&path).unwrap();

        let mut loaded = LinearRegression::from_file(&path).unwrap();
        for x in [0.0, 1.0 / 7.0, 12.5] {
            model.predict(&[x]).unwrap();
            loaded.predict(&[x]).unwrap();
            assert_eq!(model.regression_data(), loaded.regression_data());
        }
    }

    #[test]
    fn test_untrained_model_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anbc.json");

        Anbc::new().with_scaling(true).save_model_to_file(&path).unwrap();
        let mut loaded = Anbc::from_file(&path).unwrap();
        assert!(!loaded.is_trained());
        assert!(loaded.use_scaling());
        assert!(matches!(loaded.predict(&[1.0]), Err(MlError::State(_))));
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linear.json");
        let mut model = LinearRegression::new();
        model.train(&line()).unwrap();
        model.save_model_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let tampered = text.replacen("\"use_scaling\": false", "\"use_scaling\": true", 1);
        assert_ne!(text, tampered);
        std::fs::write(&path, tampered).unwrap();

        let err = LinearRegression::from_file(&path).unwrap_err();
        assert!(matches!(err, MlError::Model(_)), "{err}");
    }

    #[test]
    fn test_wrong_type_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anbc.json");
        let mut data = ClassificationData::new(1);
        data.add_sample(1, vec![0.0]).unwrap();
        data.add_sample(2, vec![5.0]).unwrap();
        let mut anbc = Anbc::new();
        anbc.train(&data).unwrap();
        anbc.save_model_to_file(&path).unwrap();

        let mut linear = LinearRegression::new();
        assert!(linear.load_model_from_file(&path).is_err());
        assert!(!linear.is_trained());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Anbc::from_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, MlError::Io(_)));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linear.json");
        LinearRegression::new().save_model_to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, &text[..text.len() / 2]).unwrap();
        assert!(matches!(
            LinearRegression::from_file(&path),
            Err(MlError::Model(_))
        ));
    }

    #[test]
    fn test_wrong_format_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linear.json");
        write_envelope(&path, PIPELINE_FORMAT, "linear_regression", &LinearRegression::new())
            .unwrap();
        assert!(matches!(
            LinearRegression::from_file(&path),
            Err(MlError::Model(_))
        ));
    }
}
