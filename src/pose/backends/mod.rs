pub mod scripted;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::Result;

use super::estimator::{EstimatorSettings, PoseEstimator};

pub use scripted::ScriptedEstimator;
pub use stub::StubEstimator;

#[cfg(feature = "backend-tract")]
pub use tract::TractPoseEstimator;

/// Open the backend named by `model_path`.
///
/// `stub://` paths select the stub backend; anything else is loaded as an
/// ONNX model and needs the `backend-tract` feature.
pub fn open_estimator(
    model_path: &str,
    settings: &EstimatorSettings,
) -> Result<Box<dyn PoseEstimator>> {
    if model_path.starts_with("stub://") {
        return Ok(Box::new(StubEstimator::new()));
    }
    #[cfg(feature = "backend-tract")]
    {
        Ok(Box::new(TractPoseEstimator::new(model_path, settings.clone())?))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        let _ = settings;
        anyhow::bail!(
            "pose model {} requires the backend-tract feature",
            model_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_path_opens_stub_backend() -> Result<()> {
        let estimator = open_estimator("stub://pose", &EstimatorSettings::default())?;
        assert_eq!(estimator.name(), "stub");
        Ok(())
    }
}
