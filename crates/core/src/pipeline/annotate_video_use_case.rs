use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dispatch::dispatcher::{DispatchError, Dispatcher, Method, Preference};
use crate::pipeline::overlay::draw_detections;
use crate::pipeline::sampling::is_sampled;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// Callback invoked after each frame is written: `(frame_number, total_frames)`.
///
/// `frame_number` is 1-based; `total_frames` comes from container metadata
/// and may be 0 when the container does not record a count.
pub type ProgressFn = Box<dyn FnMut(usize, usize) + Send>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Open(String),
    #[error("Video contains no frames")]
    EmptyVideo,
    #[error("Failed to decode frame {frame}: {message}")]
    Decode { frame: usize, message: String },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("{0}")]
    Encode(String),
}

/// Counters for a completed video run.
///
/// `total_frames` is the container's claim, `processed_frames` is what was
/// actually decoded and written; the two can disagree and both are reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoRunStats {
    pub total_frames: usize,
    pub processed_frames: usize,
    pub detections: usize,
    pub fps: u32,
}

#[derive(Debug)]
pub struct VideoRunReport {
    pub output_path: PathBuf,
    /// Back end that served the last sampled frame. `None` when no frame
    /// was sampled, which only happens for zero-length inputs.
    pub method: Option<Method>,
    pub stats: VideoRunStats,
}

/// Runs detection over a video and writes an annotated copy.
///
/// Frames are processed strictly in order on the calling thread. Detection
/// runs on sampled frames only; every frame is written either way. A
/// dispatch failure on any sampled frame aborts the run, releases the
/// reader and writer, and removes the partial output file.
pub struct AnnotateVideoUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    dispatcher: Dispatcher,
    preference: Preference,
    on_progress: Option<ProgressFn>,
}

impl AnnotateVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        dispatcher: Dispatcher,
        preference: Preference,
    ) -> Self {
        Self {
            reader,
            writer,
            dispatcher,
            preference,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn execute(
        &mut self,
        input: &Path,
        output: &Path,
    ) -> Result<VideoRunReport, PipelineError> {
        let metadata = self
            .reader
            .open(input)
            .map_err(|e| PipelineError::Open(e.to_string()))?;

        if let Err(e) = self.writer.open(output, &metadata) {
            self.reader.close();
            // Encoders may create the container file before failing.
            let _ = std::fs::remove_file(output);
            return Err(PipelineError::Encode(e.to_string()));
        }

        // Disjoint borrows so the frame iterator can hold the reader while
        // the loop drives the writer and dispatcher.
        let Self {
            reader,
            writer,
            dispatcher,
            preference,
            on_progress,
        } = self;

        let total_frames = metadata.total_frames;
        let result = (|| {
            let mut processed = 0usize;
            let mut detections_total = 0usize;
            let mut method = None;

            for (i, item) in reader.frames().enumerate() {
                let frame_number = i + 1;
                let mut frame = item.map_err(|e| PipelineError::Decode {
                    frame: frame_number,
                    message: e.to_string(),
                })?;

                if is_sampled(frame_number) {
                    let outcome = dispatcher.dispatch(&frame, *preference)?;
                    detections_total += outcome.detections.len();
                    method = Some(outcome.method);
                    draw_detections(&mut frame, &outcome.detections);
                }

                writer
                    .write(&frame)
                    .map_err(|e| PipelineError::Encode(e.to_string()))?;
                processed += 1;

                if let Some(cb) = on_progress.as_mut() {
                    cb(frame_number, total_frames);
                }
            }

            if processed == 0 {
                return Err(PipelineError::EmptyVideo);
            }
            Ok((processed, detections_total, method))
        })();

        self.reader.close();

        let (processed, detections, method) = match result {
            Ok(counters) => counters,
            Err(e) => {
                let _ = self.writer.close();
                let _ = std::fs::remove_file(output);
                return Err(e);
            }
        };

        if let Err(e) = self.writer.close() {
            let _ = std::fs::remove_file(output);
            return Err(PipelineError::Encode(e.to_string()));
        }

        Ok(VideoRunReport {
            output_path: output.to_path_buf(),
            method,
            stats: VideoRunStats {
                total_frames: metadata.total_frames,
                processed_frames: processed,
                detections,
                fps: metadata.nominal_fps(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detector::Detector;
    use crate::shared::detection::{BoundingBox, Detection};
    use crate::shared::frame::Frame;
    use crate::shared::video_metadata::VideoMetadata;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct VecReader {
        frames: Vec<Frame>,
        metadata: VideoMetadata,
        closed: Arc<AtomicUsize>,
    }

    impl VecReader {
        fn new(num_frames: usize, fps: f64) -> (Self, Arc<AtomicUsize>) {
            let frames = (0..num_frames)
                .map(|i| Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, i))
                .collect();
            let closed = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    frames,
                    metadata: VideoMetadata {
                        width: 64,
                        height: 48,
                        fps,
                        total_frames: num_frames,
                        codec: "mpeg4".to_string(),
                        source_path: None,
                    },
                    closed: closed.clone(),
                },
                closed,
            )
        }
    }

    impl VideoReader for VecReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Ok(self.metadata.clone())
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(self.frames.clone().into_iter().map(Ok))
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CollectingWriter {
        written: Arc<Mutex<Vec<Frame>>>,
        fail_open: bool,
        fail_write_at: Option<usize>,
    }

    impl CollectingWriter {
        fn new() -> (Box<Self>, Arc<Mutex<Vec<Frame>>>) {
            let written = Arc::new(Mutex::new(Vec::new()));
            (
                Box::new(Self {
                    written: written.clone(),
                    fail_open: false,
                    fail_write_at: None,
                }),
                written,
            )
        }
    }

    impl VideoWriter for CollectingWriter {
        fn open(
            &mut self,
            _path: &Path,
            _metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("container not writable".into());
            }
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            let mut written = self.written.lock().unwrap();
            if Some(written.len() + 1) == self.fail_write_at {
                return Err("encoder choked".into());
            }
            written.push(frame.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    /// Back end that replays a script, one entry per call. The final entry
    /// repeats if the script runs dry.
    struct ScriptedDetector {
        script: VecDeque<Result<Vec<Detection>, String>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedDetector {
        fn new(
            script: Vec<Result<Vec<Detection>, String>>,
        ) -> (Box<dyn Detector>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    script: script.into(),
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    impl Detector for ScriptedDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.script.len() > 1 {
                self.script.pop_front().unwrap()
            } else {
                self.script.front().cloned().unwrap()
            };
            result.map_err(|m| -> Box<dyn std::error::Error> { m.into() })
        }
    }

    fn detection() -> Detection {
        Detection::new(BoundingBox::new(5, 5, 20, 20), 0.9, "snake")
    }

    fn use_case(
        reader: VecReader,
        writer: Box<CollectingWriter>,
        remote: Box<dyn Detector>,
        local: Box<dyn Detector>,
        preference: Preference,
    ) -> AnnotateVideoUseCase {
        AnnotateVideoUseCase::new(
            Box::new(reader),
            writer,
            Dispatcher::new(remote, local),
            preference,
        )
    }

    #[test]
    fn test_processes_all_frames_and_samples_detection() {
        let (reader, _) = VecReader::new(12, 30.0);
        let (writer, written) = CollectingWriter::new();
        // Samples land on frames 1, 5, 10 and return 2, 0, 1 boxes.
        let (remote, remote_calls) = ScriptedDetector::new(vec![
            Ok(vec![detection(), detection()]),
            Ok(vec![]),
            Ok(vec![detection()]),
        ]);
        let (local, local_calls) = ScriptedDetector::new(vec![Ok(vec![])]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto);
        let report = uc
            .execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap();

        assert_eq!(remote_calls.load(Ordering::SeqCst), 3);
        assert_eq!(local_calls.load(Ordering::SeqCst), 0);

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 12);
        // Frame 5 was sampled but found nothing: written clean, like the
        // unsampled frames around it.
        assert!(written[0].data().iter().any(|&b| b == 255));
        assert!(written[4].data().iter().all(|&b| b == 0));
        assert!(written[9].data().iter().any(|&b| b == 255));

        assert_eq!(report.method, Some(Method::Api));
        assert_eq!(
            report.stats,
            VideoRunStats {
                total_frames: 12,
                processed_frames: 12,
                detections: 3,
                fps: 30,
            }
        );
    }

    #[test]
    fn test_unsampled_frames_are_written_unannotated() {
        let (reader, _) = VecReader::new(6, 30.0);
        let (writer, written) = CollectingWriter::new();
        let (remote, _) = ScriptedDetector::new(vec![Ok(vec![detection()])]);
        let (local, _) = ScriptedDetector::new(vec![Ok(vec![])]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto);
        uc.execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap();

        let written = written.lock().unwrap();
        // Frame 1 is sampled and annotated, frame 2 passes through untouched
        assert!(written[0].data().iter().any(|&b| b == 255));
        assert!(written[1].data().iter().all(|&b| b == 0));
        // No carry-over onto frames between samples
        assert!(written[2].data().iter().all(|&b| b == 0));
        assert!(written[3].data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_dispatch_failure_aborts_and_removes_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        // Simulate a partially written file from the aborted run
        std::fs::write(&output, b"partial").unwrap();

        let (reader, reader_closed) = VecReader::new(12, 30.0);
        let (writer, written) = CollectingWriter::new();
        // Succeeds on frame 1, fails on frame 5
        let (remote, _) = ScriptedDetector::new(vec![
            Ok(vec![detection()]),
            Err("Network error calling inference API: timeout".to_string()),
        ]);
        let (local, _) = ScriptedDetector::new(vec![Err(
            "Local model detection error: bad tensor".to_string()
        )]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto);
        let err = uc.execute(Path::new("in.mp4"), &output).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Dispatch(DispatchError::BothFailed(_))
        ));
        // Frames 1-4 were written before the abort, frame 5 never reached the writer
        assert_eq!(written.lock().unwrap().len(), 4);
        assert_eq!(reader_closed.load(Ordering::SeqCst), 1);
        assert!(!output.exists());
    }

    #[test]
    fn test_api_preference_failure_never_touches_local() {
        let (reader, _) = VecReader::new(3, 30.0);
        let (writer, _) = CollectingWriter::new();
        let (remote, _) = ScriptedDetector::new(vec![Err(
            "Network error calling inference API: refused".to_string(),
        )]);
        let (local, local_calls) = ScriptedDetector::new(vec![Ok(vec![detection()])]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Api);
        let err = uc
            .execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap_err();

        assert!(matches!(err, PipelineError::Dispatch(DispatchError::Api(_))));
        assert_eq!(local_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_progress_reports_every_written_frame_in_order() {
        let (reader, _) = VecReader::new(7, 24.0);
        let (writer, _) = CollectingWriter::new();
        let (remote, _) = ScriptedDetector::new(vec![Ok(vec![])]);
        let (local, _) = ScriptedDetector::new(vec![Ok(vec![])]);

        let calls: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let calls_ref = calls.clone();

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto).with_progress(
            Box::new(move |current, total| {
                calls_ref.lock().unwrap().push((current, total));
            }),
        );
        uc.execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap();

        let calls = calls.lock().unwrap();
        let expected: Vec<(usize, usize)> = (1..=7).map(|n| (n, 7)).collect();
        assert_eq!(*calls, expected);
    }

    #[test]
    fn test_progress_stops_at_abort() {
        let (reader, _) = VecReader::new(12, 30.0);
        let (writer, _) = CollectingWriter::new();
        let (remote, _) = ScriptedDetector::new(vec![
            Ok(vec![]),
            Err("API detection error: 500 Internal Server Error: boom".to_string()),
        ]);
        let (local, _) = ScriptedDetector::new(vec![Err(
            "Local model detection error: bad tensor".to_string()
        )]);

        let count = Arc::new(AtomicUsize::new(0));
        let count_ref = count.clone();

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto).with_progress(
            Box::new(move |_, _| {
                count_ref.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let _ = uc
            .execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap_err();

        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_empty_video_is_an_error() {
        let (reader, _) = VecReader::new(0, 30.0);
        let (writer, _) = CollectingWriter::new();
        let (remote, _) = ScriptedDetector::new(vec![Ok(vec![])]);
        let (local, _) = ScriptedDetector::new(vec![Ok(vec![])]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto);
        let err = uc
            .execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyVideo));
    }

    #[test]
    fn test_write_failure_aborts_run() {
        let (reader, _) = VecReader::new(5, 30.0);
        let (mut writer, written) = CollectingWriter::new();
        writer.fail_write_at = Some(3);
        let (remote, _) = ScriptedDetector::new(vec![Ok(vec![])]);
        let (local, _) = ScriptedDetector::new(vec![Ok(vec![])]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto);
        let err = uc
            .execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap_err();

        assert!(matches!(err, PipelineError::Encode(_)));
        assert_eq!(written.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_writer_open_failure_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        // Encoders may create the container before the open fails
        std::fs::write(&output, b"partial").unwrap();

        let (reader, reader_closed) = VecReader::new(5, 30.0);
        let (mut writer, _) = CollectingWriter::new();
        writer.fail_open = true;
        let (remote, remote_calls) = ScriptedDetector::new(vec![Ok(vec![detection()])]);
        let (local, _) = ScriptedDetector::new(vec![Ok(vec![])]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto);
        let err = uc.execute(Path::new("in.mp4"), &output).unwrap_err();

        assert!(matches!(err, PipelineError::Encode(_)));
        assert_eq!(remote_calls.load(Ordering::SeqCst), 0);
        assert_eq!(reader_closed.load(Ordering::SeqCst), 1);
        assert!(!output.exists());
    }

    #[test]
    fn test_fractional_fps_reported_as_nominal_integer() {
        let (reader, _) = VecReader::new(2, 29.97);
        let (writer, _) = CollectingWriter::new();
        let (remote, _) = ScriptedDetector::new(vec![Ok(vec![])]);
        let (local, _) = ScriptedDetector::new(vec![Ok(vec![])]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Auto);
        let report = uc
            .execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap();
        assert_eq!(report.stats.fps, 30);
    }

    #[test]
    fn test_local_preference_fallthrough_records_local_method() {
        let (reader, _) = VecReader::new(5, 30.0);
        let (writer, _) = CollectingWriter::new();
        let (remote, remote_calls) = ScriptedDetector::new(vec![Ok(vec![detection()])]);
        let (local, _) = ScriptedDetector::new(vec![Ok(vec![detection()])]);

        let mut uc = use_case(reader, writer, remote, local, Preference::Local);
        let report = uc
            .execute(Path::new("in.mp4"), Path::new("/tmp/out-nonexistent.mp4"))
            .unwrap();

        assert_eq!(report.method, Some(Method::Local));
        assert_eq!(remote_calls.load(Ordering::SeqCst), 0);
    }
}
