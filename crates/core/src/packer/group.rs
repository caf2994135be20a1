use crate::types::{TranscriptRecord, VideoRef};

/// Records destined for one output file, with their running cost.
///
/// `token_count` always equals the sum over `records`; the fields are private
/// so nothing can add a record without updating it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group<'a> {
    records: Vec<&'a TranscriptRecord>,
    token_count: u64,
}

impl<'a> Group<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(record: &'a TranscriptRecord) -> Self {
        let mut group = Self::new();
        group.push(record);
        group
    }

    pub fn from_records(records: impl IntoIterator<Item = &'a TranscriptRecord>) -> Self {
        let mut group = Self::new();
        for record in records {
            group.push(record);
        }
        group
    }

    pub fn push(&mut self, record: &'a TranscriptRecord) {
        self.token_count += record.token_count;
        self.records.push(record);
    }

    /// Moves every record of `other` to the end of this group.
    pub fn append(&mut self, other: Group<'a>) {
        self.token_count += other.token_count;
        self.records.extend(other.records);
    }

    /// True when adding `record` would take the group past `limit`.
    pub fn would_exceed(&self, record: &TranscriptRecord, limit: u64) -> bool {
        self.token_count + record.token_count > limit
    }

    pub fn take(&mut self) -> Group<'a> {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    pub fn records(&self) -> &[&'a TranscriptRecord] {
        &self.records
    }

    pub fn video_refs(&self) -> Vec<VideoRef> {
        self.records.iter().map(|r| r.video_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, tokens: u64) -> TranscriptRecord {
        TranscriptRecord {
            video_id: id.to_string(),
            title: format!("Video {id}"),
            text: String::new(),
            token_count: tokens,
        }
    }

    #[test]
    fn token_count_tracks_pushes_and_appends() {
        let a = record("a", 10);
        let b = record("b", 20);
        let c = record("c", 5);

        let mut group = Group::single(&a);
        group.push(&b);
        assert_eq!(group.token_count(), 30);

        group.append(Group::single(&c));
        assert_eq!(group.token_count(), 35);
        assert_eq!(group.len(), 3);
        assert_eq!(
            group.token_count(),
            group.records().iter().map(|r| r.token_count).sum::<u64>()
        );
    }

    #[test]
    fn take_leaves_an_empty_group() {
        let a = record("a", 10);
        let mut group = Group::single(&a);
        let taken = group.take();

        assert!(group.is_empty());
        assert_eq!(group.token_count(), 0);
        assert_eq!(taken.token_count(), 10);
    }

    #[test]
    fn would_exceed_is_strict() {
        let a = record("a", 60);
        let b = record("b", 40);
        let group = Group::single(&a);

        assert!(!group.would_exceed(&b, 100));
        assert!(group.would_exceed(&b, 99));
    }
}
