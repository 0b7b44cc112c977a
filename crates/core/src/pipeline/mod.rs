pub mod annotate_image_use_case;
pub mod annotate_video_use_case;
pub mod overlay;
pub mod sampling;
