use std::sync::RwLock;

/// Fixed-capacity FIFO of recent items. When full, a push silently displaces
/// the oldest entry. One writer and any number of snapshot readers are safe;
/// readers never hold the lock across iteration because `snapshot` copies.
pub struct RingBuffer<T: Clone> {
    inner: RwLock<Ring<T>>,
}

struct Ring<T> {
    data: Vec<Option<T>>,
    head: usize,
    count: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(Ring {
                data: (0..capacity).map(|_| None).collect(),
                head: 0,
                count: 0,
            }),
        }
    }

    pub fn push(&self, item: T) {
        let mut ring = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let cap = ring.data.len();
        let tail = (ring.head + ring.count) % cap;
        ring.data[tail] = Some(item);
        if ring.count < cap {
            ring.count += 1;
        } else {
            ring.head = (ring.head + 1) % cap;
        }
    }

    /// Copy of the buffered items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        let ring = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let cap = ring.data.len();
        (0..ring.count)
            .filter_map(|i| ring.data[(ring.head + i) % cap].clone())
            .collect()
    }

    /// The most recent item, if any.
    pub fn last(&self) -> Option<T> {
        let ring = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        if ring.count == 0 {
            return None;
        }
        let cap = ring.data.len();
        ring.data[(ring.head + ring.count - 1) % cap].clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .data
            .len()
    }

    pub fn clear(&self) {
        let mut ring = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        for slot in &mut ring.data {
            *slot = None;
        }
        ring.head = 0;
        ring.count = 0;
    }
}

#[cfg(test)]
mod tests;
