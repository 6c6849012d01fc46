//! Inspect-draft command implementation.

use chrono::{DateTime, Utc};
use quotesync_engine::{DraftRecord, FileStorage};
use quotesync_protocol::{changed_fields, DocumentId, Payload};
use serde::Serialize;
use std::path::Path;

/// Decoded draft.
#[derive(Debug, Serialize)]
pub struct DraftSummary {
    /// Document id.
    pub id: String,
    /// Version the draft is based on.
    pub version: u64,
    /// Timestamp of that version.
    pub updated_at: DateTime<Utc>,
    /// Whether the draft holds unsynced edits.
    pub dirty: bool,
    /// Fields that differ from the last-synced payload.
    pub unsynced_fields: Vec<String>,
    /// Working payload.
    pub working: Payload,
}

impl From<DraftRecord> for DraftSummary {
    fn from(draft: DraftRecord) -> Self {
        let unsynced_fields = changed_fields(&draft.last_synced, &draft.working)
            .into_iter()
            .collect();
        Self {
            id: draft.id.to_string(),
            version: draft.version,
            updated_at: draft.updated_at,
            dirty: draft.dirty,
            unsynced_fields,
            working: draft.working,
        }
    }
}

/// Loads the draft for `id` from `path`.
pub fn load(path: &Path, id: &DocumentId) -> Result<DraftSummary, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No draft directory at {:?}", path).into());
    }
    let storage = FileStorage::open(path)?;
    let draft = DraftRecord::load(&storage, id)?
        .ok_or_else(|| format!("No draft for {id} in {:?}", path))?;
    Ok(draft.into())
}

/// Runs the inspect-draft command.
pub fn run(path: &Path, id: &DocumentId, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let summary = load(path, id)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => {
            println!("Draft: {}", summary.id);
            println!("  Version:    {}", summary.version);
            println!("  Updated at: {}", summary.updated_at.to_rfc3339());
            println!("  Dirty:      {}", summary.dirty);
            if summary.unsynced_fields.is_empty() {
                println!("  Unsynced:   none");
            } else {
                println!("  Unsynced:   {}", summary.unsynced_fields.join(", "));
            }
            println!("  Payload:");
            for (field, value) in summary.working.iter() {
                println!("    {field}: {value}");
            }
        }
    }

    Ok(())
}
