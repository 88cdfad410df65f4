//! Action types and the per-step log kept by an exerciser run.
//!
//! Each step the exerciser performs (launching the app, waiting for a field,
//! tapping it, typing into it) is recorded as an [`ActionLog`]. A run's log
//! can be written out as JSON Lines with [`write_jsonl`].
//!
//! ```
//! use tessera_core::action::{ActionLog, ActionResult, ActionType};
//!
//! let log = ActionLog::new(
//!     ActionType::Tap { selector: "t_1".to_string() },
//!     ActionResult::Success,
//!     Some(12),
//! );
//! println!("{} at {}", log.action.name(), log.timestamp);
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionResult {
    Success,
    Failure(String),
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success)
    }
}

/// A single step performed against the application under test.
///
/// Serialized with a `type` tag so log lines are self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionType {
    /// Launch a fresh instance of the application.
    LaunchApp { bundle_id: String },

    /// Wait for an element to appear.
    WaitFor {
        selector: String,
        element_type: Option<String>,
        timeout_ms: u64,
    },

    /// Tap an element by accessibility identifier.
    Tap { selector: String },

    /// Send keyboard input to the focused element.
    SendKeys { text: String },
}

impl ActionType {
    /// Short static name for tracing span metadata.
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::LaunchApp { .. } => "launch_app",
            ActionType::WaitFor { .. } => "wait_for",
            ActionType::Tap { .. } => "tap",
            ActionType::SendKeys { .. } => "send_keys",
        }
    }
}

/// A logged action with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: ActionType,
    pub result: ActionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ActionLog {
    /// Creates an entry with a fresh id, stamped with the current time.
    pub fn new(action: ActionType, result: ActionResult, duration_ms: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            result,
            duration_ms,
        }
    }
}

/// Writes one JSON object per line.
pub fn write_jsonl<W: Write>(mut writer: W, logs: &[ActionLog]) -> std::io::Result<()> {
    for log in logs {
        let json = serde_json::to_string(log)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{}", json)?;
    }
    writer.flush()
}

/// Writes `logs` to a new `exercise_<timestamp>.jsonl` file in `dir` and
/// returns its path.
pub fn save_log(dir: &Path, logs: &[ActionLog]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let name = format!("exercise_{}.jsonl", Utc::now().format("%Y%m%d_%H%M%S_%3f"));
    let path = dir.join(name);
    let file = std::fs::File::create(&path)?;
    write_jsonl(std::io::BufWriter::new(file), logs)?;
    Ok(path)
}
