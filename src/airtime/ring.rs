//! Fixed-capacity ring with overwrite semantics
//!
//! Pushing onto a full ring evicts the element at the opposite end, so the
//! ring never grows past `N` and never allocates.

use heapless::Deque;

/// Double-ended circular buffer of `N` elements.
pub struct FixedRing<T, const N: usize> {
    items: Deque<T, N>,
}

impl<T: Copy, const N: usize> FixedRing<T, N> {
    /// Create an empty ring.
    pub const fn new() -> Self {
        Self {
            items: Deque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Remove and return the element at the back, `None` when empty.
    pub fn pop_back(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Remove and return the element at the front, `None` when empty.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Push at the back, evicting the front element when full.
    pub fn push_back(&mut self, item: T) {
        if self.items.is_full() {
            self.items.pop_front();
        }
        // Cannot fail: a slot was freed above if needed
        let _ = self.items.push_back(item);
    }

    /// Push at the front, evicting the back element when full.
    pub fn push_front(&mut self, item: T) {
        if self.items.is_full() {
            self.items.pop_back();
        }
        let _ = self.items.push_front(item);
    }

    /// Push copies of `item` at the back until the ring is full.
    pub fn fill(&mut self, item: T) {
        while !self.items.is_full() {
            let _ = self.items.push_back(item);
        }
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.items.front_mut()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Copy, const N: usize> Default for FixedRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ring() {
        let ring: FixedRing<u8, 4> = FixedRing::new();

        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.size(), 0);
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert!(ring.front().is_none());
        assert!(ring.back().is_none());
    }

    #[test]
    fn test_size_tracks_net_pushes() {
        let mut ring: FixedRing<u8, 4> = FixedRing::new();

        ring.push_back(1);
        ring.push_front(2);
        ring.push_back(3);
        assert_eq!(ring.size(), 3);

        assert_eq!(ring.pop_front(), Some(2));
        assert_eq!(ring.size(), 2);

        ring.push_front(4);
        ring.push_front(5);
        assert_eq!(ring.size(), 4);
        assert!(ring.is_full());
    }

    #[test]
    fn test_push_back_evicts_front() {
        let mut ring: FixedRing<u8, 3> = FixedRing::new();

        for i in 1..=5 {
            ring.push_back(i);
        }

        assert_eq!(ring.size(), 3);
        assert_eq!(ring.front(), Some(&3));
        assert_eq!(ring.back(), Some(&5));
    }

    #[test]
    fn test_push_front_evicts_back() {
        let mut ring: FixedRing<u8, 3> = FixedRing::new();

        for i in 1..=5 {
            ring.push_front(i);
        }

        assert_eq!(ring.size(), 3);
        assert_eq!(ring.front(), Some(&5));
        assert_eq!(ring.back(), Some(&3));
        assert_eq!(ring.pop_back(), Some(3));
        assert_eq!(ring.pop_back(), Some(4));
        assert_eq!(ring.pop_back(), Some(5));
        assert_eq!(ring.pop_back(), None);
    }

    #[test]
    fn test_fill_and_clear() {
        let mut ring: FixedRing<u16, 5> = FixedRing::new();
        ring.push_back(7);
        ring.fill(0);

        assert!(ring.is_full());
        assert_eq!(ring.front(), Some(&7));
        assert_eq!(ring.iter().filter(|&&v| v == 0).count(), 4);

        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.size(), 0);
    }

    #[test]
    fn test_front_mut() {
        let mut ring: FixedRing<u16, 2> = FixedRing::new();
        ring.fill(0);

        if let Some(front) = ring.front_mut() {
            *front += 10;
        }

        assert_eq!(ring.front(), Some(&10));
        assert_eq!(ring.back(), Some(&0));
    }
}
