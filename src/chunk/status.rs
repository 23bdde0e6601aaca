//! Human-readable status dumps.
//!
//! Formatting is advisory, not a wire contract: the report exposes per-visit
//! state and per-chunk owner/usable/interest information for operators and
//! test logs.

use std::fmt;

use super::descriptor::ChunkInfo;

/// Point-in-time snapshot of the manager produced by
/// [`ChunkManager::status`](super::ChunkManager::status).
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// `(id, failed)` per tracked visit, sorted by id.
    visits: Vec<(i64, bool)>,
    /// Live chunks, sorted by `(visit_id, id)`.
    chunks: Vec<ChunkInfo>,
}

impl StatusReport {
    pub(crate) fn new(visits: Vec<(i64, bool)>, mut chunks: Vec<ChunkInfo>) -> Self {
        chunks.sort_unstable_by_key(|c| (c.visit_id, c.id));
        Self { visits, chunks }
    }

    pub fn visits(&self) -> &[(i64, bool)] {
        &self.visits
    }

    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }
}

/// Whether two chunks render as one line: same owner, same flags, and
/// consecutive ids.
fn merge(a: &ChunkInfo, b: &ChunkInfo) -> bool {
    a.visit_id == b.visit_id
        && a.usable == b.usable
        && a.interesting == b.interesting
        && a.id + 1 == b.id
}

fn flags(c: &ChunkInfo) -> String {
    let mut s = String::from(if c.usable { "usable" } else { "unusable" });
    if c.interesting {
        s.push_str(", interesting");
    }
    s
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.visits.is_empty() {
            writeln!(f, "No visits being tracked")?;
        } else {
            writeln!(f, "Visits:")?;
            for &(id, failed) in &self.visits {
                let state = if failed { "failed" } else { "in-flight" };
                writeln!(f, "    visit {id}: {state}")?;
            }
        }

        if self.chunks.is_empty() {
            writeln!(f, "Chunks with an owner: none")?;
            return Ok(());
        }

        writeln!(f, "Chunks with an owner:")?;
        let mut owner = None;
        let mut run = 0;
        for (i, chunk) in self.chunks.iter().enumerate() {
            if owner != Some(chunk.visit_id) {
                owner = Some(chunk.visit_id);
                writeln!(f, "    owned by visit {}:", chunk.visit_id)?;
            }
            let merged_with_next = self
                .chunks
                .get(i + 1)
                .is_some_and(|next| merge(chunk, next));
            if merged_with_next {
                run += 1;
                continue;
            }
            let first = &self.chunks[i - run];
            if run == 0 {
                writeln!(f, "        chunk {}: {}", chunk.id, flags(chunk))?;
            } else {
                writeln!(
                    f,
                    "        chunks {}-{}: {}",
                    first.id,
                    chunk.id,
                    flags(chunk)
                )?;
            }
            run = 0;
        }
        Ok(())
    }
}

impl fmt::Display for ChunkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {}: owned by visit {}, {}, {} entries in {} blocks ({} allocated), {} entries in delta",
            self.id,
            self.visit_id,
            flags(self),
            self.size,
            self.next_block,
            self.num_blocks,
            self.size.saturating_sub(self.delta),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::StatusReport;
    use crate::chunk::descriptor::ChunkInfo;

    fn chunk(id: i64, visit_id: i64, usable: bool, interesting: bool) -> ChunkInfo {
        ChunkInfo {
            id,
            visit_id,
            usable,
            size: 0,
            delta: 0,
            num_blocks: 0,
            next_block: 0,
            interesting,
        }
    }

    #[test]
    fn empty_report() {
        let report = StatusReport::new(Vec::new(), Vec::new());
        let text = report.to_string();
        assert!(text.contains("No visits being tracked"));
        assert!(text.contains("Chunks with an owner: none"));
    }

    #[test]
    fn chunks_group_by_owner_and_merge_runs() {
        let report = StatusReport::new(
            vec![(1, false), (2, true)],
            vec![
                chunk(102, 2, false, false),
                chunk(100, 1, true, false),
                chunk(101, 1, true, false),
                chunk(103, 2, true, false),
            ],
        );
        let text = report.to_string();

        assert!(text.contains("visit 1: in-flight"));
        assert!(text.contains("visit 2: failed"));
        // Consecutive ids with identical flags merge into a range.
        assert!(text.contains("chunks 100-101: usable"));
        // Differing flags keep chunks on separate lines even when ids touch.
        assert!(text.contains("chunk 102: unusable"));
        assert!(text.contains("chunk 103: usable"));
    }

    #[test]
    fn interest_flag_is_rendered() {
        let report = StatusReport::new(
            vec![(1, false)],
            vec![chunk(100, 1, false, true)],
        );
        assert!(report.to_string().contains("unusable, interesting"));
    }

    #[test]
    fn chunk_detail_rendering() {
        let mut info = chunk(100, 7, true, false);
        info.size = 600;
        info.delta = 512;
        info.next_block = 2;
        info.num_blocks = 3;

        let text = info.to_string();
        assert!(text.contains("chunk 100"));
        assert!(text.contains("owned by visit 7"));
        assert!(text.contains("600 entries in 2 blocks (3 allocated)"));
        assert!(text.contains("88 entries in delta"));
    }
}
