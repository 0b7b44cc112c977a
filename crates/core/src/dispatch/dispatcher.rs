use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::detection::domain::detector::Detector;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Which back ends a dispatch call may use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Preference {
    /// Remote first, local on any remote failure.
    #[default]
    Auto,
    /// Remote only, no fallback.
    Api,
    /// Local only, the remote client is never called.
    Local,
}

impl FromStr for Preference {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Preference::Auto),
            "api" => Ok(Preference::Api),
            "local" => Ok(Preference::Local),
            other => Err(DispatchError::InvalidPreference(other.to_string())),
        }
    }
}

/// Back end that produced a successful result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Api,
    Local,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Api => write!(f, "API"),
            Method::Local => write!(f, "LOCAL"),
        }
    }
}

/// A successful dispatch: normalized detections plus their provenance.
#[derive(Clone, Debug)]
pub struct DetectionOutcome {
    pub method: Method,
    pub detections: Vec<Detection>,
}

/// Failure taxonomy of a dispatch call. The payload is the back end's
/// own message, untouched, so the error classifier sees the original
/// wording.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{0}")]
    Api(String),
    #[error("{0}")]
    Local(String),
    /// Auto mode exhausted both back ends. Carries only the local error
    /// text; the remote error was logged at warn level and dropped.
    #[error("{0}")]
    BothFailed(String),
    #[error("Unrecognized detection preference '{0}'. Expected auto, api, or local.")]
    InvalidPreference(String),
}

/// Chooses between the remote and local back ends for a single frame and
/// normalizes both outcomes into one result shape.
///
/// The dispatcher performs no retries and enforces no timeouts of its
/// own; each back end owns its transport behavior.
pub struct Dispatcher {
    remote: Box<dyn Detector>,
    local: Box<dyn Detector>,
}

impl Dispatcher {
    pub fn new(remote: Box<dyn Detector>, local: Box<dyn Detector>) -> Self {
        Self { remote, local }
    }

    pub fn dispatch(
        &mut self,
        frame: &Frame,
        preference: Preference,
    ) -> Result<DetectionOutcome, DispatchError> {
        match preference {
            Preference::Api => self
                .remote
                .detect(frame)
                .map(|detections| DetectionOutcome {
                    method: Method::Api,
                    detections,
                })
                .map_err(|e| DispatchError::Api(e.to_string())),
            Preference::Local => self
                .local
                .detect(frame)
                .map(|detections| DetectionOutcome {
                    method: Method::Local,
                    detections,
                })
                .map_err(|e| DispatchError::Local(e.to_string())),
            Preference::Auto => match self.remote.detect(frame) {
                Ok(detections) => Ok(DetectionOutcome {
                    method: Method::Api,
                    detections,
                }),
                Err(remote_err) => {
                    log::warn!("remote inference failed, falling back to local model: {remote_err}");
                    self.local
                        .detect(frame)
                        .map(|detections| DetectionOutcome {
                            method: Method::Local,
                            detections,
                        })
                        .map_err(|local_err| DispatchError::BothFailed(local_err.to_string()))
                }
            },
        }
    }
}
