//! Queue listing command implementation.

use std::path::Path;
use std::sync::Arc;

use craftsync_engine::SyncQueue;
use craftsync_store::{FileBackend, StorageBackend};

/// Runs the queue command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(path, false)?);
    let queue = SyncQueue::open(backend)?;
    let mut items = queue.peek_all();
    let total = items.len();
    if let Some(limit) = limit {
        items.truncate(limit);
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&items)?),
        _ => {
            if items.is_empty() {
                println!("Queue is empty");
                return Ok(());
            }
            println!("Pending mutations ({} total):", total);
            println!();
            for item in &items {
                let snapshot_size = item
                    .snapshot
                    .as_ref()
                    .map(|r| serde_json::to_vec(&r.payload).map(|b| b.len()).unwrap_or(0));
                match snapshot_size {
                    Some(bytes) => println!(
                        "  [{:>4}] {:<6} {} enqueued_at={} retries={} payload={} bytes",
                        item.seq,
                        item.kind,
                        item.record_id,
                        item.enqueued_at,
                        item.retry_count,
                        bytes
                    ),
                    None => println!(
                        "  [{:>4}] {:<6} {} enqueued_at={} retries={}",
                        item.seq, item.kind, item.record_id, item.enqueued_at, item.retry_count
                    ),
                }
            }
        }
    }

    Ok(())
}
