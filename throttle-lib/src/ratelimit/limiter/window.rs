use std::collections::VecDeque;

/// A rolling window that keeps only the `capacity` most recent elements,
/// dropping the oldest one when a new element would exceed the capacity.
///
/// The limiter uses it to remember the last `burst` dispatch instants.
#[derive(Debug, Clone)]
pub(crate) struct Window<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> Window<T> {
    /// Create a new window with the given capacity (at least one element)
    #[must_use]
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an element to the window, removing the oldest if at capacity
    pub(crate) fn push(&mut self, item: T) {
        if self.data.len() >= self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(item);
    }

    /// Whether the window holds `capacity` elements
    #[must_use]
    pub(crate) fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    /// The oldest element still in the window
    #[must_use]
    pub(crate) fn oldest(&self) -> Option<&T> {
        self.data.front()
    }

    /// The most recently pushed element
    #[must_use]
    pub(crate) fn newest(&self) -> Option<&T> {
        self.data.back()
    }
}
