pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
pub mod image_file_reader;
pub mod image_file_writer;

use crate::shared::frame::Frame;

/// Packs a decoded RGB24 ffmpeg picture into a tight [`Frame`] buffer.
///
/// libav rows may carry stride padding past `width * 3`; the rest of the
/// crate assumes tightly packed pixels, so the padding is dropped here.
pub(crate) fn pack_rgb_frame(
    rgb: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
    index: usize,
) -> Frame {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    Frame::new(pixels, width, height, index)
}
