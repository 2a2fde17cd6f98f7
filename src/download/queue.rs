use super::item::{QueueItem, QueueState};
use super::service::DownloadId;
use std::collections::VecDeque;
use uuid::Uuid;

/// Ordered download queue
///
/// Owned by the orchestrator, so no locking. Insertion order is dispatch order.
#[derive(Debug, Default)]
pub struct DownloadQueue {
    items: VecDeque<QueueItem>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn add(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    /// Clone of every item in queue order
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn find_by_download_id_mut(&mut self, download_id: DownloadId) -> Option<&mut QueueItem> {
        self.items
            .iter_mut()
            .find(|i| i.download_id == Some(download_id))
    }

    /// Oldest item still waiting for a slot
    pub fn first_new(&self) -> Option<Uuid> {
        self.items.iter().find(|i| i.is_new()).map(|i| i.id)
    }

    /// True if another item past `New` already targets `target_path`
    pub fn has_claimed_target(&self, target_path: &str, except: Uuid) -> bool {
        self.items.iter().any(|i| {
            i.id != except && i.state != QueueState::New && i.target_path == target_path
        })
    }

    /// Items not yet in a terminal state
    pub fn pending_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_done()).count()
    }

    pub fn terminal_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_done()).count()
    }

    /// Drop the oldest terminal items until at most `keep` remain.
    ///
    /// Items that are still waiting, running or owed a stop event are never evicted.
    pub fn evict_terminal(&mut self, keep: usize) -> Vec<QueueItem> {
        let mut excess = self.terminal_count().saturating_sub(keep);
        if excess == 0 {
            return Vec::new();
        }

        let mut evicted = Vec::with_capacity(excess);
        let mut kept = VecDeque::with_capacity(self.items.len() - excess);
        for item in self.items.drain(..) {
            if excess > 0 && item.is_done() && !item.awaiting_stop() {
                excess -= 1;
                evicted.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.items = kept;
        evicted
    }

    /// Remove every item, returning them in queue order
    pub fn clear(&mut self) -> Vec<QueueItem> {
        self.items.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::item::DownloadOptions;
    use crate::media::MediaItem;

    fn create_test_item(url: &str) -> QueueItem {
        QueueItem::new(MediaItem::from_url(url).unwrap(), DownloadOptions::default())
    }

    fn finished(url: &str) -> QueueItem {
        let mut item = create_test_item(url);
        item.transition(QueueState::Selecting);
        item.transition(QueueState::InProgress);
        item.transition(QueueState::Completed);
        item
    }

    // Construction & Basic Operations

    #[test]
    fn test_queue_new_empty() {
        let queue = DownloadQueue::new();
        assert!(queue.is_empty());
        assert!(queue.first_new().is_none());
    }

    #[test]
    fn test_queue_add_preserves_order() {
        let mut queue = DownloadQueue::new();
        let item1 = create_test_item("http://example.com/file1.zip");
        let item2 = create_test_item("http://example.com/file2.zip");
        let id1 = item1.id;
        let id2 = item2.id;

        queue.add(item1);
        queue.add(item2);

        let items = queue.snapshot();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, id1);
        assert_eq!(items[1].id, id2);
        assert_eq!(queue.first_new(), Some(id1));
    }

    #[test]
    fn test_queue_get_by_id_not_found() {
        let mut queue = DownloadQueue::new();
        queue.add(create_test_item("http://example.com/file.zip"));
        assert!(queue.get_by_id(Uuid::new_v4()).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_find_by_download_id() {
        let mut queue = DownloadQueue::new();
        let mut item = create_test_item("http://example.com/file.zip");
        item.download_id = Some(DownloadId(7));
        let id = item.id;
        queue.add(item);

        assert_eq!(
            queue.find_by_download_id_mut(DownloadId(7)).map(|i| i.id),
            Some(id)
        );
        assert!(queue.find_by_download_id_mut(DownloadId(8)).is_none());
    }

    // Scheduling helpers

    #[test]
    fn test_first_new_skips_started_items() {
        let mut queue = DownloadQueue::new();
        let mut started = create_test_item("http://example.com/a.zip");
        started.transition(QueueState::Selecting);
        let waiting = create_test_item("http://example.com/b.zip");
        let waiting_id = waiting.id;

        queue.add(started);
        queue.add(waiting);

        assert_eq!(queue.first_new(), Some(waiting_id));
        assert_eq!(queue.pending_count(), 2);
    }

    #[test]
    fn test_claimed_target_ignores_new_and_self() {
        let mut queue = DownloadQueue::new();
        let a = create_test_item("http://example.com/x/a.zip");
        let b = create_test_item("http://example.com/y/a.zip");
        let (a_id, b_id) = (a.id, b.id);
        queue.add(a);
        queue.add(b);

        assert!(!queue.has_claimed_target("a.zip", b_id));

        queue.get_mut(a_id).unwrap().transition(QueueState::Selecting);
        assert!(queue.has_claimed_target("a.zip", b_id));
        assert!(!queue.has_claimed_target("a.zip", a_id));
    }

    // Eviction

    #[test]
    fn test_evict_terminal_drops_oldest_first() {
        let mut queue = DownloadQueue::new();
        let done1 = finished("http://example.com/1.zip");
        let waiting = create_test_item("http://example.com/2.zip");
        let done2 = finished("http://example.com/3.zip");
        let done3 = finished("http://example.com/4.zip");
        let (d1, w, d2, d3) = (done1.id, waiting.id, done2.id, done3.id);

        queue.add(done1);
        queue.add(waiting);
        queue.add(done2);
        queue.add(done3);

        let evicted = queue.evict_terminal(1);
        let evicted_ids: Vec<_> = evicted.iter().map(|i| i.id).collect();
        assert_eq!(evicted_ids, vec![d1, d2]);

        let remaining: Vec<_> = queue.iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec![w, d3]);
    }

    #[test]
    fn test_evict_terminal_never_touches_active_items() {
        let mut queue = DownloadQueue::new();
        queue.add(create_test_item("http://example.com/1.zip"));
        queue.add(create_test_item("http://example.com/2.zip"));

        assert!(queue.evict_terminal(0).is_empty());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_evict_terminal_keeps_items_owed_a_stop_event() {
        let mut queue = DownloadQueue::new();
        let mut skipped = create_test_item("http://example.com/1.zip");
        skipped.transition(QueueState::Selecting);
        skipped.transition(QueueState::InProgress);
        skipped.download_id = Some(DownloadId(1));
        skipped.transition(QueueState::Skipped);
        let skipped_id = skipped.id;
        queue.add(skipped);
        queue.add(finished("http://example.com/2.zip"));

        let evicted = queue.evict_terminal(0);
        assert_eq!(evicted.len(), 1);
        assert_eq!(queue.first_new(), None);
        assert!(queue.get_by_id(skipped_id).is_some());
    }

    #[test]
    fn test_clear_returns_all_items() {
        let mut queue = DownloadQueue::new();
        queue.add(create_test_item("http://example.com/1.zip"));
        queue.add(finished("http://example.com/2.zip"));

        assert_eq!(queue.clear().len(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.terminal_count(), 0);
    }
}
