pub mod scripted;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use scripted::ScriptedBackend;
pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::pose::backend::{PoseBackend, PoseOptions};

/// Backends selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Stub,
    Tract,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "stub" => Ok(BackendKind::Stub),
            "tract" => Ok(BackendKind::Tract),
            other => Err(anyhow!("unknown pose backend '{}'", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Stub => f.write_str("stub"),
            BackendKind::Tract => f.write_str("tract"),
        }
    }
}

/// Construct the configured backend, passing `options` through unmodified.
pub fn build_backend(
    kind: BackendKind,
    options: PoseOptions,
    model_path: Option<&Path>,
) -> Result<Box<dyn PoseBackend>> {
    options.validate()?;
    match kind {
        BackendKind::Stub => Ok(Box::new(StubBackend::new(options))),
        BackendKind::Tract => {
            let path = model_path.ok_or_else(|| anyhow!("tract backend requires a model path"))?;
            #[cfg(feature = "backend-tract")]
            {
                Ok(Box::new(TractBackend::new(path, options)?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow!(
                    "model {} requires the backend-tract feature",
                    path.display()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() {
        assert_eq!("stub".parse::<BackendKind>().unwrap(), BackendKind::Stub);
        assert_eq!("Tract".parse::<BackendKind>().unwrap(), BackendKind::Tract);
        assert!("mediapipe".parse::<BackendKind>().is_err());
    }

    #[test]
    fn builds_stub_backend() {
        let backend = build_backend(BackendKind::Stub, PoseOptions::default(), None).unwrap();
        assert_eq!(backend.name(), "stub");
    }

    #[test]
    fn tract_backend_requires_model_path() {
        assert!(build_backend(BackendKind::Tract, PoseOptions::default(), None).is_err());
    }

    #[test]
    fn invalid_options_are_rejected() {
        let options = PoseOptions {
            min_detection_confidence: 2.0,
            ..PoseOptions::default()
        };
        assert!(build_backend(BackendKind::Stub, options, None).is_err());
    }
}
