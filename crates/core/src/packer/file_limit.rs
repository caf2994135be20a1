use crate::{
    emitter::FileName,
    packer::{Group, PlannedFile},
    tokens::{MAX_TOKENS_PER_FILE, SOLO_THRESHOLD},
    types::TranscriptRecord,
};

#[derive(Debug, Default)]
pub struct FileLimitPlan<'a> {
    pub files: Vec<PlannedFile<'a>>,
    /// Records left out because the file limit could only be met by dropping
    /// a group that did not fit next to any other under the hard cap.
    pub dropped: Vec<&'a TranscriptRecord>,
}

/// Plans at most `file_limit` files, largest transcripts first.
///
/// Big records stand alone, small ones are gathered together, then the two
/// smallest groups are merged until the limit is met. When the two smallest
/// groups cannot share a file under [`MAX_TOKENS_PER_FILE`], the smaller one is
/// dropped and reported in [`FileLimitPlan::dropped`].
pub fn plan_by_file_limit(records: &[TranscriptRecord], file_limit: usize) -> FileLimitPlan<'_> {
    if records.is_empty() {
        return FileLimitPlan::default();
    }

    let mut sorted: Vec<&TranscriptRecord> = records.iter().collect();
    // stable: equal costs keep input order
    sorted.sort_by(|a, b| b.token_count.cmp(&a.token_count));

    let mut groups = initial_groups(&sorted);
    let mut dropped = Vec::new();

    if groups.len() > file_limit {
        groups.sort_by_key(|g| g.token_count());
        while groups.len() > file_limit && groups.len() >= 2 {
            let smallest = groups.remove(0);
            let second = groups.remove(0);

            if smallest.token_count() + second.token_count() <= MAX_TOKENS_PER_FILE {
                let mut merged = smallest;
                merged.append(second);
                groups.push(merged);
            } else {
                dropped.extend(smallest.records().iter().copied());
                groups.push(second);
            }
            groups.sort_by_key(|g| g.token_count());
        }
    }

    let files = groups
        .into_iter()
        .enumerate()
        .map(|(i, group)| PlannedFile {
            name: FileName::Combined(i + 1),
            group,
        })
        .collect();

    FileLimitPlan { files, dropped }
}

fn initial_groups<'a>(sorted: &[&'a TranscriptRecord]) -> Vec<Group<'a>> {
    let mut groups = Vec::new();
    let mut current = Group::new();

    for &record in sorted {
        if record.token_count > SOLO_THRESHOLD || current.would_exceed(record, MAX_TOKENS_PER_FILE) {
            if !current.is_empty() {
                groups.push(current.take());
            }
            if record.token_count > 0 {
                groups.push(Group::single(record));
            }
        } else {
            current.push(record);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}
