use std::path::{Path, PathBuf};

use crate::dispatch::dispatcher::{Dispatcher, Method, Preference};
use crate::pipeline::annotate_video_use_case::PipelineError;
use crate::pipeline::overlay::draw_detections;
use crate::shared::detection::Detection;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

/// Result of a single-image run. Unlike video runs there is exactly one
/// dispatch, so the detections themselves are worth returning.
#[derive(Debug)]
pub struct ImageRunReport {
    pub output_path: PathBuf,
    pub method: Method,
    pub detections: Vec<Detection>,
}

/// Runs detection on a single image and writes an annotated copy.
pub struct AnnotateImageUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn ImageWriter>,
    dispatcher: Dispatcher,
    preference: Preference,
}

impl AnnotateImageUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn ImageWriter>,
        dispatcher: Dispatcher,
        preference: Preference,
    ) -> Self {
        Self {
            reader,
            writer,
            dispatcher,
            preference,
        }
    }

    pub fn execute(
        &mut self,
        input: &Path,
        output: &Path,
    ) -> Result<ImageRunReport, PipelineError> {
        self.reader
            .open(input)
            .map_err(|e| PipelineError::Open(e.to_string()))?;

        let first = self.reader.frames().next();
        let frame = match first {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                self.reader.close();
                return Err(PipelineError::Decode {
                    frame: 1,
                    message: e.to_string(),
                });
            }
            None => {
                self.reader.close();
                return Err(PipelineError::EmptyVideo);
            }
        };
        self.reader.close();

        let mut frame = frame;
        let outcome = self.dispatcher.dispatch(&frame, self.preference)?;
        draw_detections(&mut frame, &outcome.detections);

        self.writer
            .write(output, &frame)
            .map_err(|e| PipelineError::Encode(e.to_string()))?;

        Ok(ImageRunReport {
            output_path: output.to_path_buf(),
            method: outcome.method,
            detections: outcome.detections,
        })
    }
}
