//! Buffered Priority Queue
//!
//! A binary min-heap that delays heapifying new elements until the next pop.
//!
//! One resource update often activates many behaviors at once, and admitting
//! several extents in a single event can activate dozens more before anything
//! runs. Pushing into a buffer and sifting only on `pop` means a burst of
//! pushes costs one pass instead of repeated re-heaping.
//!
//! The queue does not store priorities. Behavior orders live in the scheduler
//! arena and may change between pushes and pops, so `pop` takes a key
//! function. After a bulk re-ranking, `unsort` moves everything back into the
//! buffer so the next `pop` re-sifts with the corrected keys.

/// Min-heap keyed by an externally stored order.
#[derive(Debug, Clone)]
pub struct BufferedQueue<T> {
    heap: Vec<T>,
    buffer: Vec<T>,
}

impl<T> BufferedQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            heap: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// Add an item. It is not placed in the heap until the next `pop`.
    pub fn push(&mut self, item: T) {
        self.buffer.push(item);
    }

    /// Remove and return the item with the smallest key.
    pub fn pop<F>(&mut self, order_of: F) -> Option<T>
    where
        F: Fn(&T) -> usize,
    {
        if !self.buffer.is_empty() {
            let buffered = std::mem::take(&mut self.buffer);
            for item in buffered {
                self.heap.push(item);
                let last = self.heap.len() - 1;
                self.sift_up(last, &order_of);
            }
        }

        if self.heap.is_empty() {
            return None;
        }

        let item = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0, &order_of);
        }
        Some(item)
    }

    /// Number of queued items, heaped or buffered.
    pub fn len(&self) -> usize {
        self.heap.len() + self.buffer.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every heaped item back to the buffer, keeping them all.
    pub fn unsort(&mut self) {
        self.buffer.append(&mut self.heap);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.buffer.clear();
    }

    fn sift_up<F>(&mut self, mut pos: usize, order_of: &F)
    where
        F: Fn(&T) -> usize,
    {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if order_of(&self.heap[pos]) >= order_of(&self.heap[parent]) {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down<F>(&mut self, mut pos: usize, order_of: &F)
    where
        F: Fn(&T) -> usize,
    {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }

            let right = left + 1;
            let mut best = left;
            if right < len && order_of(&self.heap[right]) < order_of(&self.heap[left]) {
                best = right;
            }

            if order_of(&self.heap[best]) >= order_of(&self.heap[pos]) {
                break;
            }
            self.heap.swap(pos, best);
            pos = best;
        }
    }
}

impl<T> Default for BufferedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
