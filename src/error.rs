use thiserror::Error;

use crate::ecs::Entity;

/// Why a texture or shader program could not be loaded.
///
/// Cloneable because every caller awaiting the same in-flight load receives
/// its own copy of the outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("could not fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("could not decode {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("shader folder {folder} has no {stage} stage")]
    MissingStage { folder: String, stage: &'static str },
    #[error("the device rejected {key}: {reason}")]
    Device { key: String, reason: String },
}

impl LoadError {
    pub(crate) fn fetch(url: &str, err: &anyhow::Error) -> Self {
        Self::Fetch {
            url: url.to_owned(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn device(key: &str, err: &anyhow::Error) -> Self {
        Self::Device {
            key: key.to_owned(),
            reason: format!("{err:#}"),
        }
    }
}

/// Errors that abort a frame.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no active camera is set on the scene")]
    NoActiveCamera,
    #[error("the active camera entity {0} has no camera component")]
    MissingCameraComponent(Entity),
    #[error("device failure: {0:#}")]
    Device(#[from] anyhow::Error),
}
