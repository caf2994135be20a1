use crate::{
    emitter::FileName,
    packer::{Group, PlannedFile},
    tokens::MAX_TOKENS_PER_FILE,
    types::TranscriptRecord,
};

/// Plans files so that none exceeds `limit` (capped at [`MAX_TOKENS_PER_FILE`]).
///
/// Input order is kept within and across files. A record that is too large on
/// its own is written alone as a `large_video_*` file and never blocks the
/// records around it.
pub fn plan_by_token_limit(records: &[TranscriptRecord], limit: u64) -> Vec<PlannedFile<'_>> {
    let mut accumulator = TokenLimitAccumulator::new(limit, 1);
    for record in records {
        accumulator.handle(record);
    }
    accumulator.into_files()
}

pub(crate) struct TokenLimitAccumulator<'a> {
    limit: u64,
    next_part: usize,
    current: Group<'a>,
    files: Vec<PlannedFile<'a>>,
}

impl<'a> TokenLimitAccumulator<'a> {
    /// `first_part` numbers the first combined file; later ones count up from it.
    pub(crate) fn new(limit: u64, first_part: usize) -> Self {
        Self {
            limit: limit.min(MAX_TOKENS_PER_FILE),
            next_part: first_part,
            current: Group::new(),
            files: Vec::new(),
        }
    }

    pub(crate) fn handle(&mut self, record: &'a TranscriptRecord) {
        if record.token_count > self.limit {
            self.flush();
            self.files.push(PlannedFile {
                name: FileName::Large(record.video_id.clone()),
                group: Group::single(record),
            });
            return;
        }
        if !self.current.is_empty() && self.current.would_exceed(record, self.limit) {
            self.flush();
        }
        self.current.push(record);
    }

    pub(crate) fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        self.files.push(PlannedFile {
            name: FileName::Combined(self.next_part),
            group: self.current.take(),
        });
        self.next_part += 1;
    }

    pub(crate) fn next_part(&self) -> usize {
        self.next_part
    }

    pub(crate) fn into_files(mut self) -> Vec<PlannedFile<'a>> {
        self.flush();
        self.files
    }
}
