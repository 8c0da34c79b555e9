//! Verify command implementation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use craftsync_engine::QUEUE_TABLE;
use craftsync_protocol::{MutationKind, ProjectRecord, QueueItem};
use craftsync_store::{from_cbor, FileBackend, StorageBackend, RECORDS_TABLE};

/// Verification result for one table.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of entries checked.
    pub entries_checked: usize,
    /// Number of valid entries.
    pub valid_entries: usize,
    /// Number of corrupt or inconsistent entries.
    pub bad_entries: usize,
    /// List of problems found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn new() -> Self {
        Self {
            entries_checked: 0,
            valid_entries: 0,
            bad_entries: 0,
            errors: Vec::new(),
        }
    }

    fn is_ok(&self) -> bool {
        self.bad_entries == 0 && self.errors.is_empty()
    }

    fn flag(&mut self, message: String) {
        self.errors.push(message);
        self.bad_entries += 1;
    }
}

/// Runs the verify command.
pub fn run(
    path: &Path,
    check_records: bool,
    check_queue: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store at {:?}", path);
    println!();

    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(path, false)?);

    let mut records_result = VerifyResult::new();
    let mut queue_result = VerifyResult::new();

    if check_records {
        println!("Checking records...");
        records_result = verify_records(&backend)?;
        print_result("Record", &records_result);
    }

    if check_queue {
        println!("Checking queue...");
        queue_result = verify_queue(&backend)?;
        print_result("Queue", &queue_result);
    }

    println!();
    if records_result.is_ok() && queue_result.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}

fn verify_records(
    backend: &Arc<dyn StorageBackend>,
) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::new();

    for (key, bytes) in backend.scan(RECORDS_TABLE)? {
        result.entries_checked += 1;
        let record: ProjectRecord = match from_cbor(&bytes) {
            Ok(record) => record,
            Err(e) => {
                result.flag(format!("Undecodable record at key {}: {}", key, e));
                continue;
            }
        };
        if record.id.to_string() != key {
            result.flag(format!(
                "Record id {} stored under mismatched key {}",
                record.id, key
            ));
            continue;
        }
        if record.updated_at < record.created_at {
            result.flag(format!(
                "Record {} updated_at precedes created_at",
                record.id
            ));
            continue;
        }
        result.valid_entries += 1;
    }

    Ok(result)
}

fn verify_queue(
    backend: &Arc<dyn StorageBackend>,
) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::new();
    let mut seen_records = HashSet::new();
    let mut seen_seqs = HashSet::new();

    for (key, bytes) in backend.scan(QUEUE_TABLE)? {
        result.entries_checked += 1;
        let item: QueueItem = match from_cbor(&bytes) {
            Ok(item) => item,
            Err(e) => {
                result.flag(format!("Undecodable queue item at key {}: {}", key, e));
                continue;
            }
        };
        if item.id.to_string() != key {
            result.flag(format!(
                "Queue item {} stored under mismatched key {}",
                item.id, key
            ));
            continue;
        }
        if !seen_records.insert(item.record_id) {
            result.flag(format!(
                "Record {} has more than one pending item",
                item.record_id
            ));
            continue;
        }
        if !seen_seqs.insert(item.seq) {
            result.flag(format!("Duplicate queue sequence {}", item.seq));
            continue;
        }
        match (item.kind, &item.snapshot) {
            (MutationKind::Delete, Some(_)) => {
                result.flag(format!("Delete item for {} carries a snapshot", item.record_id));
                continue;
            }
            (MutationKind::Create | MutationKind::Update, None) => {
                result.flag(format!(
                    "{} item for {} is missing its snapshot",
                    item.kind, item.record_id
                ));
                continue;
            }
            (_, Some(snapshot)) if snapshot.id != item.record_id => {
                result.flag(format!(
                    "Queue item for {} holds a snapshot of {}",
                    item.record_id, snapshot.id
                ));
                continue;
            }
            _ => {}
        }
        result.valid_entries += 1;
    }

    Ok(result)
}

fn print_result(name: &str, result: &VerifyResult) {
    println!(
        "  {} entries checked: {}, valid: {}, bad: {}",
        name, result.entries_checked, result.valid_entries, result.bad_entries
    );
    for error in &result.errors {
        println!("    ERROR: {}", error);
    }
}
