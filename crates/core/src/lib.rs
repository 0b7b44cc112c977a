//! Snake detection with hosted-API-first inference and local ONNX fallback.
//!
//! The library is split into domain interfaces and infrastructure
//! implementations: detection back ends behind [`detection::domain::detector::Detector`],
//! video/image I/O behind the traits in [`video::domain`], and the
//! remote-then-local fallback policy in [`dispatch::dispatcher::Dispatcher`].
//! The pipelines in [`pipeline`] wire these together for single images and
//! frame-by-frame video annotation.

pub mod detection;
pub mod dispatch;
pub mod pipeline;
pub mod shared;
pub mod video;
