//! Recency List Module
//!
//! Doubly-linked recency ordering stored in a slot arena, so positions are
//! plain indices and every link operation is O(1).
//!
//! - Front = most recently promoted
//! - Back = least recently promoted

/// Index of a node in the arena.
pub type Slot = usize;

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<Slot>,
    next: Option<Slot>,
}

// == Recency List ==
/// Arena-backed doubly-linked list ordered by recency.
#[derive(Debug)]
pub struct RecencyList<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<Slot>,
    head: Option<Slot>,
    tail: Option<Slot>,
    len: usize,
}

impl<T> RecencyList<T> {
    // == Constructor ==
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Links a new value at the front and returns its slot.
    pub fn push_front(&mut self, value: T) -> Slot {
        let node = Node {
            value,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.attach_front(slot);
        self.len += 1;
        slot
    }

    // == Move To Front ==
    /// Moves an existing node to the front; returns `false` if `slot` is empty.
    pub fn move_to_front(&mut self, slot: Slot) -> bool {
        if self.node(slot).is_none() {
            return false;
        }
        if self.head != Some(slot) {
            self.detach(slot);
            self.attach_front(slot);
        }
        true
    }

    // == Remove ==
    /// Unlinks the node at `slot` and frees the slot.
    pub fn remove(&mut self, slot: Slot) -> Option<T> {
        self.node(slot)?;
        self.detach(slot);
        let node = self.nodes[slot].take()?;
        self.free.push(slot);
        self.len -= 1;
        Some(node.value)
    }

    // == Pop Back ==
    /// Unlinks and returns the least recently promoted value.
    pub fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(tail)
    }

    /// Value stored at `slot`.
    pub fn get(&self, slot: Slot) -> Option<&T> {
        self.node(slot).map(|node| &node.value)
    }

    /// Least recently promoted value.
    pub fn back(&self) -> Option<&T> {
        self.tail.and_then(|slot| self.get(slot))
    }

    /// Most recently promoted value.
    #[allow(dead_code)]
    pub fn front(&self) -> Option<&T> {
        self.head.and_then(|slot| self.get(slot))
    }

    /// Iterates from the back (oldest) towards the front.
    #[allow(dead_code)]
    pub fn iter_from_back(&self) -> impl Iterator<Item = &T> + '_ {
        let mut cursor = self.tail;
        std::iter::from_fn(move || {
            let node = self.node(cursor?)?;
            cursor = node.prev;
            Some(&node.value)
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, slot: Slot) -> Option<&Node<T>> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: Slot) -> Option<&mut Node<T>> {
        self.nodes.get_mut(slot).and_then(Option::as_mut)
    }

    fn detach(&mut self, slot: Slot) {
        let (prev, next) = match self.node(slot) {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(prev) => {
                if let Some(node) = self.node_mut(prev) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Some(node) = self.node_mut(next) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_front(&mut self, slot: Slot) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => {
                if let Some(node) = self.node_mut(head) {
                    node.prev = Some(slot);
                }
            }
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn order_from_back<T: Clone>(list: &RecencyList<T>) -> Vec<T> {
        list.iter_from_back().cloned().collect()
    }

    #[test]
    fn test_list_new() {
        let list: RecencyList<&str> = RecencyList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.back(), None);
    }

    #[test]
    fn test_push_front_orders_by_recency() {
        let mut list = RecencyList::new();
        list.push_front("key1");
        list.push_front("key2");
        list.push_front("key3");

        assert_eq!(list.len(), 3);
        // key1 is oldest (added first)
        assert_eq!(list.back(), Some(&"key1"));
        assert_eq!(list.front(), Some(&"key3"));
    }

    #[test]
    fn test_move_to_front() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        list.push_front("b");
        list.push_front("c");

        assert!(list.move_to_front(a));

        assert_eq!(order_from_back(&list), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_move_head_is_noop() {
        let mut list = RecencyList::new();
        list.push_front("a");
        let b = list.push_front("b");

        assert!(list.move_to_front(b));
        assert_eq!(order_from_back(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_middle() {
        let mut list = RecencyList::new();
        list.push_front("key1");
        let key2 = list.push_front("key2");
        list.push_front("key3");

        assert_eq!(list.remove(key2), Some("key2"));
        assert_eq!(list.len(), 2);
        assert_eq!(order_from_back(&list), vec!["key1", "key3"]);
    }

    #[test]
    fn test_remove_twice_is_none() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");

        assert_eq!(list.remove(a), Some("a"));
        assert_eq!(list.remove(a), None);
        assert!(!list.move_to_front(a));
        assert!(list.is_empty());
    }

    #[test]
    fn test_slots_are_reused() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        list.remove(a);
        let b = list.push_front("b");

        assert_eq!(a, b);
        assert_eq!(list.get(b), Some(&"b"));
    }

    #[test]
    fn test_pop_back_drains_oldest_first() {
        let mut list = RecencyList::new();
        list.push_front("a");
        list.push_front("b");
        list.push_front("c");

        assert_eq!(list.pop_back(), Some("a"));
        assert_eq!(list.pop_back(), Some("b"));
        assert_eq!(list.pop_back(), Some("c"));
        assert_eq!(list.pop_back(), None);
    }

    #[test]
    fn test_order_after_multiple_touches() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        let b = list.push_front("b");
        let c = list.push_front("c");

        list.move_to_front(a);
        list.move_to_front(c);
        list.move_to_front(b);

        // front=[b, c, a]=back
        assert_eq!(order_from_back(&list), vec!["a", "c", "b"]);
    }
}
