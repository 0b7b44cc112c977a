pub mod dispatcher;
pub mod error_classifier;
