use crate::{ScoreEntry, Scores, Summary, SummaryRow};

#[derive(Clone, Copy)]
enum Contribution {
    Post,
    Reply,
}

impl SummaryRow {
    fn start(entry: &ScoreEntry) -> Self {
        Self {
            id: entry.user_id,
            name: entry.user_name.clone(),
            posts: 0,
            replies: 0,
            karma: 0,
        }
    }

    fn record(&mut self, entry: &ScoreEntry, what: Contribution) {
        match what {
            Contribution::Post => self.posts += 1,
            Contribution::Reply => self.replies += 1,
        }
        self.karma += entry.karma;
    }
}

/// Per-author totals over every entry that was actually awarded karma.
/// Posts are scanned before replies, so an author's name comes from the
/// first awarded entry in that order.
pub fn summarize(scores: &Scores) -> Summary {
    let mut summary = Summary::new();
    let awarded = scores
        .posts
        .values()
        .map(|e| (e, Contribution::Post))
        .chain(scores.replies.values().map(|e| (e, Contribution::Reply)))
        .filter(|(e, _)| e.karma > 0);
    for (entry, what) in awarded {
        summary
            .entry(entry.user_id)
            .or_insert_with(|| SummaryRow::start(entry))
            .record(entry, what);
    }
    summary
}
