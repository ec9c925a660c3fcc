//! Uniform random selection of one file from a directory in a single pass.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, warn};

/// Pick one item uniformly at random from `entries` among those satisfying
/// `predicate`.
///
/// Consumes the iterator once and holds at most one candidate at a time.
pub fn select_one<I, P, R>(entries: I, mut predicate: P, rng: &mut R) -> Option<I::Item>
where
    I: IntoIterator,
    P: FnMut(&I::Item) -> bool,
    R: Rng,
{
    let mut chosen = None;
    let mut count: u64 = 0;

    for entry in entries {
        if !predicate(&entry) {
            continue;
        }
        count += 1;
        if rng.gen_range(0..count) == 0 {
            chosen = Some(entry);
        }
    }

    chosen
}

/// A directory entry as seen by the chunk filter.
pub trait CandidateEntry {
    fn path(&self) -> PathBuf;
    fn is_file(&self) -> bool;
    fn size(&self) -> io::Result<u64>;
}

impl CandidateEntry for fs::DirEntry {
    fn path(&self) -> PathBuf {
        fs::DirEntry::path(self)
    }

    // Both follow symlinks; a dangling link fails the stat and is skipped.
    fn is_file(&self) -> bool {
        fs::metadata(fs::DirEntry::path(self))
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    fn size(&self) -> io::Result<u64> {
        fs::metadata(fs::DirEntry::path(self)).map(|m| m.len())
    }
}

/// Which directory entries count as usable chunks.
#[derive(Debug, Clone)]
pub struct ChunkFilter {
    /// File extension without the dot, compared case-insensitively.
    pub extension: String,
    /// Entries must be strictly larger than this many bytes.
    pub min_size: u64,
}

impl Default for ChunkFilter {
    fn default() -> Self {
        Self {
            extension: "mp4".to_string(),
            min_size: 100_000,
        }
    }
}

impl ChunkFilter {
    pub fn qualifies<E: CandidateEntry>(&self, entry: &E) -> bool {
        if !entry.is_file() {
            return false;
        }

        let path = entry.path();
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false);
        if !ext_matches {
            return false;
        }

        match entry.size() {
            Ok(size) => size > self.min_size,
            Err(e) => {
                debug!("Skipping {}: {e}", path.display());
                false
            }
        }
    }
}

/// Stream `dir` and return one qualifying chunk path, chosen uniformly.
///
/// Entries that cannot be read are skipped. Returns `Ok(None)` when nothing
/// qualifies.
pub fn select_random_chunk<R: Rng>(
    dir: &Path,
    filter: &ChunkFilter,
    rng: &mut R,
) -> io::Result<Option<PathBuf>> {
    let entries = fs::read_dir(dir)?.filter_map(|entry| match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Unreadable entry in {}: {e}", dir.display());
            None
        }
    });

    let chosen = select_one(entries, |entry| filter.qualifies(entry), rng);
    Ok(chosen.map(|entry| entry.path()))
}
