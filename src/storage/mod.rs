//! Optional persistence: sled history log and the recorder task feeding it

mod history;
mod recorder;

pub use history::{AlertLogEntry, AlertLogKind, HistoryLog, StorageError, StorageStats};
pub use recorder::{spawn_recorder, RecorderStats};
