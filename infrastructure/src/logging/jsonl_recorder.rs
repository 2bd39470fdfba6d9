//! JSONL file writer for run traces.
//!
//! Each event is one JSON line with a `type` field and an RFC 3339
//! `timestamp` (write time). Step events carry the step under `step`,
//! finished runs carry the full report under `run`:
//!
//! ```text
//! {"type":"step","timestamp":"...","run_id":"...","step":{"step":1,"persona":"soap_editor",...}}
//! {"type":"run_finished","timestamp":"...","run_id":"...","run":{"run_id":"...","steps":[...],...}}
//! ```
//!
//! The file is opened in append mode and shared by every run of the process.

use middleware_application::{RecorderError, TraceRecorder};
use middleware_domain::{OrchestrationRun, RunReport, StepRecord, StepReport};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const STEP_EVENT: &str = "step";
const RUN_FINISHED_EVENT: &str = "run_finished";

/// Append-only JSONL trace recorder.
///
/// Thread-safe via `Mutex<BufWriter<File>>`; every line is flushed as soon
/// as it is written so concurrent runs interleave whole lines only.
pub struct JsonlTraceRecorder {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlTraceRecorder {
    /// Open (or create) the trace file, creating parent directories.
    ///
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create trace directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open trace file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_event(
        &self,
        event_type: &str,
        run_id: &str,
        key: &str,
        payload: Value,
    ) -> Result<(), RecorderError> {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut record = Map::new();
        record.insert("type".to_string(), Value::String(event_type.to_string()));
        record.insert("timestamp".to_string(), Value::String(timestamp));
        record.insert("run_id".to_string(), Value::String(run_id.to_string()));
        record.insert(key.to_string(), payload);
        let line = serde_json::to_string(&record)?;

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    /// Find the finished run `run_id` in a trace file.
    ///
    /// Step events are skipped; only `run_finished` lines are considered.
    /// Returns `Ok(None)` when the run is not in the file.
    pub fn load_run(
        path: impl AsRef<Path>,
        run_id: &str,
    ) -> Result<Option<OrchestrationRun>, RecorderError> {
        let reader = BufReader::new(File::open(path)?);
        let mut found = None;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut value: Value = serde_json::from_str(&line)?;
            if value["type"] != RUN_FINISHED_EVENT || value["run_id"] != run_id {
                continue;
            }
            let report: RunReport = serde_json::from_value(value["run"].take())?;
            found = Some(report);
        }

        found
            .map(OrchestrationRun::from_report)
            .transpose()
            .map_err(|e| RecorderError::InvalidRecord(e.to_string()))
    }
}

impl TraceRecorder for JsonlTraceRecorder {
    fn append(&self, run_id: &str, step: &StepRecord) -> Result<(), RecorderError> {
        let payload = serde_json::to_value(StepReport::from(step))?;
        self.write_event(STEP_EVENT, run_id, "step", payload)
    }

    fn finalize(&self, run: &OrchestrationRun) -> Result<(), RecorderError> {
        let payload = serde_json::to_value(run.to_report())?;
        self.write_event(RUN_FINISHED_EVENT, &run.run_id, "run", payload)
    }
}

impl Drop for JsonlTraceRecorder {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
