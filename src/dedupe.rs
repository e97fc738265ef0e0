use crate::model::{Message, SearchPage};
use std::collections::HashSet;

/// Reduction stage over fetched pages.
///
/// Keeps only the target author's messages, each identifier once in
/// first-seen order; [`Deduplicator::finish`] then sorts by creation time.
/// The same message showing up on several pages (pages shift while messages
/// are deleted) is expected, and later copies are dropped even if their
/// fields differ.
pub struct Deduplicator {
    user_id: String,
    seen: HashSet<String>,
    messages: Vec<Message>,
}

impl Deduplicator {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            seen: HashSet::new(),
            messages: Vec::new(),
        }
    }

    /// Returns true if the message was kept.
    pub fn push(&mut self, message: Message) -> bool {
        if message.author.id != self.user_id {
            return false;
        }
        if !self.seen.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Flattens every group of the page, returning how many messages were new.
    pub fn push_page(&mut self, page: SearchPage) -> usize {
        let mut added = 0;
        for message in page.messages.into_iter().flatten() {
            if self.push(message) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Oldest first. The sort is stable, so equal timestamps keep first-seen order.
    pub fn finish(mut self) -> Vec<Message> {
        self.messages.sort_by_key(|m| m.timestamp);
        self.messages
    }
}

pub fn dedupe_and_sort<I>(pages: I, user_id: &str) -> Vec<Message>
where
    I: IntoIterator<Item = SearchPage>,
{
    let mut dedup = Deduplicator::new(user_id);
    for page in pages {
        dedup.push_page(page);
    }
    dedup.finish()
}
