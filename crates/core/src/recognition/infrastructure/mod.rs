pub mod http_feature_source;
pub mod http_match_notifier;
pub mod onnx_face_analyzer;
