//! Parallel decode of shard envelopes, folded by one aggregating thread.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver, Sender};
use pcsize_core::{split_envelope, DecodedLedgers};
use pcsize_protocol::wire::read_envelope_file;
use tracing::{debug, info};

/// Decode one envelope file into ledgers.
pub fn load_ledgers(path: &Path) -> anyhow::Result<DecodedLedgers> {
    let envelope = read_envelope_file(path)
        .with_context(|| format!("failed to read envelope {}", path.display()))?;
    Ok(split_envelope(envelope))
}

/// Decode `paths` on up to `jobs` worker threads and merge them.
///
/// Shards are folded in input order whatever order the workers finish in, so
/// the merged handles are the same from run to run.
pub fn merge_files(paths: &[PathBuf], jobs: usize) -> anyhow::Result<DecodedLedgers> {
    if paths.is_empty() {
        anyhow::bail!("no input envelopes given");
    }
    let workers = jobs.clamp(1, paths.len());

    let (work_tx, work_rx) = unbounded::<(usize, PathBuf)>();
    let (done_tx, done_rx) = unbounded::<(usize, anyhow::Result<DecodedLedgers>)>();
    for (index, path) in paths.iter().enumerate() {
        // The receiver lives until the scope below ends.
        let _ = work_tx.send((index, path.clone()));
    }
    drop(work_tx);

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || decode_worker(worker, work_rx, done_tx));
        }
        drop(done_tx);
        aggregate(done_rx, paths)
    })
}

fn decode_worker(
    worker: usize,
    work: Receiver<(usize, PathBuf)>,
    done: Sender<(usize, anyhow::Result<DecodedLedgers>)>,
) {
    for (index, path) in work {
        debug!(worker, path = %path.display(), "decoding shard");
        if done.send((index, load_ledgers(&path))).is_err() {
            // Aggregator gave up after an earlier failure.
            return;
        }
    }
}

fn aggregate(
    done: Receiver<(usize, anyhow::Result<DecodedLedgers>)>,
    paths: &[PathBuf],
) -> anyhow::Result<DecodedLedgers> {
    let mut merged = DecodedLedgers::default();
    let mut pending = BTreeMap::new();
    let mut next = 0;

    for (index, result) in done {
        pending.insert(index, result?);
        while let Some(shard) = pending.remove(&next) {
            merged
                .merge(shard)
                .with_context(|| format!("failed to merge {}", paths[next].display()))?;
            next += 1;
        }
    }

    if next != paths.len() {
        anyhow::bail!("only {} of {} shards were decoded", next, paths.len());
    }
    info!(
        shards = paths.len(),
        pipelines = merged.pipelines.len(),
        pools = merged.pools.len(),
        "merged shards"
    );
    Ok(merged)
}
