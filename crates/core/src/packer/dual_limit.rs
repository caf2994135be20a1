use crate::{
    emitter::FileName,
    packer::{Group, PlannedFile, token_limit::TokenLimitAccumulator},
    tokens::MAX_TOKENS_PER_FILE,
    types::TranscriptRecord,
};

/// Files planned for one contiguous batch of the input.
#[derive(Debug)]
pub struct BatchPlan<'a> {
    pub index: usize,
    pub files: Vec<PlannedFile<'a>>,
}

/// Splits the input into `file_limit` contiguous batches and plans each one.
///
/// A batch within `token_limit` (capped at [`MAX_TOKENS_PER_FILE`]) becomes a
/// single file. A batch over it is split with token-limit packing. Part numbers run across batches, so the
/// caller only has to fold files past `file_limit` into the excess file.
pub fn plan_with_both_limits(
    records: &[TranscriptRecord],
    token_limit: u64,
    file_limit: usize,
) -> Vec<BatchPlan<'_>> {
    if records.is_empty() {
        return Vec::new();
    }

    let batch_size = batch_size(records.len(), file_limit);
    let fits = token_limit.min(MAX_TOKENS_PER_FILE);
    let mut next_part = 1;
    let mut batches = Vec::new();

    for (index, batch) in records.chunks(batch_size).enumerate() {
        let group = Group::from_records(batch);

        let files = if group.token_count() > fits {
            let mut accumulator = TokenLimitAccumulator::new(token_limit, next_part);
            for record in batch {
                accumulator.handle(record);
            }
            accumulator.flush();
            next_part = accumulator.next_part();
            accumulator.into_files()
        } else {
            let file = PlannedFile {
                name: FileName::Combined(next_part),
                group,
            };
            next_part += 1;
            vec![file]
        };

        batches.push(BatchPlan {
            index: index + 1,
            files,
        });
    }

    batches
}

/// Records per batch, never zero even when there are fewer records than files.
pub fn batch_size(record_count: usize, file_limit: usize) -> usize {
    (record_count / file_limit.max(1)).max(1)
}
