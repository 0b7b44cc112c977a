use std::path::Path;

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::infrastructure::pack_rgb_frame;

/// Whether a path names a still image, by extension.
///
/// This is the routing rule between the image and video pipelines, so it
/// lives next to the reader that backs the image side.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Presents a still image as a one-frame video behind [`VideoReader`],
/// so both pipelines dispatch and overlay through the same seam.
/// Metadata reports `fps = 0` and `total_frames = 1`.
///
/// Decoding happens eagerly inside `open`, through libavcodec rather
/// than the pure-Rust `image` crate; phone photos run to several
/// thousand pixels a side and decode noticeably faster that way. No
/// ffmpeg state outlives `open`, so the type is plain `Send` data.
pub struct ImageFileReader {
    decoded: Option<Frame>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { decoded: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let mut ictx = ffmpeg_next::format::input(path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No image data found")?;
        let stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let mut decoder = codec_ctx.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        // Push packets until the decoder hands back the picture, then
        // flush once for codecs that buffer their single frame.
        let mut picture = ffmpeg_next::util::frame::video::Video::empty();
        let mut decoded = false;
        for (s, packet) in ictx.packets() {
            if s.index() != stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
            if decoder.receive_frame(&mut picture).is_ok() {
                decoded = true;
                break;
            }
        }
        if !decoded {
            let _ = decoder.send_eof();
            decoded = decoder.receive_frame(&mut picture).is_ok();
        }
        if !decoded {
            return Err("Failed to decode image".into());
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&picture, &mut rgb)?;
        self.decoded = Some(pack_rgb_frame(&rgb, width, height, 0));

        Ok(VideoMetadata {
            width,
            height,
            fps: 0.0,
            total_frames: 1,
            codec: String::new(),
            source_path: Some(path.to_path_buf()),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.decoded.take() {
            Some(frame) => Box::new(std::iter::once(Ok(frame))),
            None => Box::new(std::iter::once(Err("ImageFileReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.decoded = None;
    }
}
