//! Inspect command implementation.

use std::path::Path;
use std::sync::Arc;

use craftsync_engine::{SyncQueue, QUEUE_TABLE};
use craftsync_protocol::{MutationKind, RecordKind};
use craftsync_store::{FileBackend, ProjectStore, StorageBackend, RECORDS_TABLE};
use serde::Serialize;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Bytes on disk holding records.
    pub records_bytes: u64,
    /// Bytes on disk holding queue items.
    pub queue_bytes: u64,
    /// Live project records.
    pub projects: usize,
    /// Live template records.
    pub templates: usize,
    /// Pending queue items.
    pub pending: usize,
    /// Pending creates.
    pub pending_creates: usize,
    /// Pending updates.
    pub pending_updates: usize,
    /// Pending deletes.
    pub pending_deletes: usize,
    /// Items that have burned at least one retry.
    pub retrying: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(path, false)?);

    let mut result = InspectResult {
        path: path.display().to_string(),
        records_bytes: table_bytes(&backend, RECORDS_TABLE)?,
        queue_bytes: table_bytes(&backend, QUEUE_TABLE)?,
        projects: 0,
        templates: 0,
        pending: 0,
        pending_creates: 0,
        pending_updates: 0,
        pending_deletes: 0,
        retrying: 0,
    };

    let store = ProjectStore::new(Arc::clone(&backend));
    for record in store.list(None)? {
        match record.kind {
            RecordKind::Project => result.projects += 1,
            RecordKind::Template => result.templates += 1,
        }
    }

    let queue = SyncQueue::open(backend)?;
    for item in queue.peek_all() {
        result.pending += 1;
        match item.kind {
            MutationKind::Create => result.pending_creates += 1,
            MutationKind::Update => result.pending_updates += 1,
            MutationKind::Delete => result.pending_deletes += 1,
        }
        if item.retry_count > 0 {
            result.retrying += 1;
        }
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }

    Ok(())
}

fn table_bytes(
    backend: &Arc<dyn StorageBackend>,
    table: &str,
) -> Result<u64, Box<dyn std::error::Error>> {
    let mut total = 0u64;
    for (_, value) in backend.scan(table)? {
        total += value.len() as u64;
    }
    Ok(total)
}

fn print_text_output(result: &InspectResult) {
    println!("craftsync Store Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Storage:");
    println!("  Records: {}", format_size(result.records_bytes));
    println!("  Queue:   {}", format_size(result.queue_bytes));
    println!();
    println!("Records:");
    println!("  Projects:  {}", result.projects);
    println!("  Templates: {}", result.templates);
    println!();
    println!("Queue:");
    println!("  Pending:  {}", result.pending);
    println!("  Creates:  {}", result.pending_creates);
    println!("  Updates:  {}", result.pending_updates);
    println!("  Deletes:  {}", result.pending_deletes);
    println!("  Retrying: {}", result.retrying);
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
