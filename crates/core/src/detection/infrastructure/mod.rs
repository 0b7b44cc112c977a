pub mod deferred_model_detector;
pub mod local_onnx_detector;
pub mod model_resolver;
pub mod remote_api_detector;
