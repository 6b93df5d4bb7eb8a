//! Persisted artifacts: a coordinate log, a per-frame info log and the
//! annotated frames as a numbered PNG sequence.
//!
//! A run exported under base name `trajectory_result` into `out/` produces
//!
//! ```text
//! out/trajectory_result_1/frame_000000.png ...
//! out/trajectory_result_1/manifest.json
//! out/trajectory_result_1.txt
//! out/trajectory_result_1_info.txt
//! ```
//!
//! where `1` is the first suffix not already taken.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detection::DetectionRecord;
use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::sink::{ErrorEvent, ResultSink, StopReason, TickResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Nominal playback rate recorded in the manifest.
    pub fps: u32,
    pub base_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fps: 20,
            base_name: "trajectory_result".to_string(),
        }
    }
}

/// `Frame{idx} ID:{id} BBox:[x1, y1, x2, y2] Conf:{c:.2}`
///
/// Unidentified records get id `-1`, missing confidences print as `0.00`.
pub fn coordinate_line(frame_index: u64, record: &DetectionRecord) -> String {
    let id = record.track_id.map_or(-1, |id| id as i64);
    let [x1, y1, x2, y2] = record.bbox.to_array().map(|v| v.round() as i64);
    let confidence = record.confidence.unwrap_or(0.0);
    format!("Frame{frame_index} ID:{id} BBox:[{x1}, {y1}, {x2}, {y2}] Conf:{confidence:.2}")
}

/// Output locations for one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub frames_dir: PathBuf,
    pub coordinates: PathBuf,
    pub info: PathBuf,
}

impl ExportPaths {
    fn with_suffix(dir: &Path, base: &str, n: u32) -> Self {
        Self {
            frames_dir: dir.join(format!("{base}_{n}")),
            coordinates: dir.join(format!("{base}_{n}.txt")),
            info: dir.join(format!("{base}_{n}_info.txt")),
        }
    }

    fn exists(&self) -> bool {
        self.frames_dir.exists() || self.coordinates.exists() || self.info.exists()
    }

    /// Paths for `{base}_{n}` with the smallest free `n >= 1`.
    pub fn next_free(dir: &Path, base: &str) -> Self {
        let mut n = 1;
        loop {
            let paths = Self::with_suffix(dir, base, n);
            if !paths.exists() {
                return paths;
            }
            n += 1;
        }
    }
}

/// One line per (frame, record).
pub struct CoordinateLog {
    writer: BufWriter<File>,
}

impl CoordinateLog {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    pub fn write_records(&mut self, frame_index: u64, records: &[DetectionRecord]) -> Result<()> {
        for record in records {
            writeln!(self.writer, "{}", coordinate_line(frame_index, record))?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Manifest {
    fps: u32,
    width: u32,
    height: u32,
    frames: usize,
}

/// Writes frames as `frame_{index:06}.png` and a `manifest.json` on finish.
#[derive(Debug)]
pub struct FrameSequenceWriter {
    dir: PathBuf,
    fps: u32,
    size: Option<(u32, u32)>,
    written: usize,
}

impl FrameSequenceWriter {
    pub fn create(dir: &Path, fps: u32) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            fps,
            size: None,
            written: 0,
        })
    }

    pub fn write(&mut self, frame_index: u64, frame: &Frame) -> Result<()> {
        frame
            .image()
            .save(self.dir.join(format!("frame_{frame_index:06}.png")))?;
        if self.size.is_none() {
            self.size = Some((frame.width(), frame.height()));
        }
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn write_manifest(&self) -> Result<()> {
        let (width, height) = self.size.unwrap_or((0, 0));
        let manifest = Manifest {
            fps: self.fps,
            width,
            height,
            frames: self.written,
        };
        let mut writer = BufWriter::new(File::create(self.dir.join("manifest.json"))?);
        serde_json::to_writer_pretty(&mut writer, &manifest).map_err(|e| PipelineError::Export(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

struct Writers {
    coordinates: CoordinateLog,
    info: BufWriter<File>,
    frames: FrameSequenceWriter,
}

/// Sink writing every tick to disk.
///
/// Files are flushed and the manifest written exactly once, on `finish` or
/// on drop, whichever comes first.
pub struct ExportSink {
    paths: ExportPaths,
    writers: Option<Writers>,
}

impl ExportSink {
    /// Allocate the next free `{base_name}_{n}` under `dir` and open writers.
    pub fn create(dir: &Path, config: &ExportConfig) -> Result<Self> {
        if config.fps == 0 {
            return Err(PipelineError::Config("export fps must be positive".into()));
        }
        fs::create_dir_all(dir)?;
        let paths = ExportPaths::next_free(dir, &config.base_name);
        let writers = Writers {
            coordinates: CoordinateLog::create(&paths.coordinates)?,
            info: BufWriter::new(File::create(&paths.info)?),
            frames: FrameSequenceWriter::create(&paths.frames_dir, config.fps)?,
        };
        info!(frames = %paths.frames_dir.display(), "export opened");
        Ok(Self {
            paths,
            writers: Some(writers),
        })
    }

    pub fn paths(&self) -> &ExportPaths {
        &self.paths
    }

    /// Write one frame's artifacts. Fails once the sink has been closed.
    pub fn write_entry(
        &mut self,
        frame_index: u64,
        records: &[DetectionRecord],
        info_lines: &[String],
        annotated: Option<&Frame>,
    ) -> Result<()> {
        let writers = self
            .writers
            .as_mut()
            .ok_or_else(|| PipelineError::Export("export already closed".into()))?;
        writers.coordinates.write_records(frame_index, records)?;
        for line in info_lines {
            writeln!(writers.info, "{line}")?;
        }
        if let Some(frame) = annotated {
            writers.frames.write(frame_index, frame)?;
        }
        Ok(())
    }

    /// Flush everything and write the manifest. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut writers) = self.writers.take() else {
            return Ok(());
        };
        writers.coordinates.flush()?;
        writers.info.flush()?;
        writers.frames.write_manifest()?;
        info!(
            frames = writers.frames.written(),
            coordinates = %self.paths.coordinates.display(),
            "export closed"
        );
        Ok(())
    }
}

impl ResultSink for ExportSink {
    fn emit(&mut self, result: TickResult) {
        let lines = result.info_lines();
        if let Err(err) = self.write_entry(result.frame_index, &result.records, &lines, Some(result.annotated.as_ref())) {
            warn!(frame_index = result.frame_index, error = %err, "export write failed");
        }
    }

    fn emit_error(&mut self, event: ErrorEvent) {
        let Some(writers) = self.writers.as_mut() else {
            return;
        };
        let frame = event.frame_index.map_or_else(|| "-".to_string(), |i| i.to_string());
        if let Err(err) = writeln!(writers.info, "Frame{frame}: error: {}", event.message) {
            warn!(error = %err, "export write failed");
        }
    }

    fn finish(&mut self, _reason: &StopReason) {
        if let Err(err) = self.close() {
            warn!(error = %err, "export close failed");
        }
    }
}

impl Drop for ExportSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "export close failed");
        }
    }
}
