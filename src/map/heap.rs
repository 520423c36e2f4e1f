/// Array-backed binary heap with an externally supplied ordering.
///
/// `sinks(a, b)` returns true when `a` must sit below `b`, so the root is always
/// an element nothing else sinks under. Keys may be changed in place through
/// [`get_mut`](Self::get_mut) as long as [`shift_down`](Self::shift_down) is
/// called for that position afterwards.
pub struct BinaryHeap<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    items: Vec<T>,
    sinks: F,
}

impl<T, F> BinaryHeap<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    /// Heapify `items` in O(n).
    pub fn new(items: Vec<T>, sinks: F) -> Self {
        let mut heap = Self { items, sinks };
        for i in (0..heap.items.len() / 2).rev() {
            heap.sift_down(i);
        }
        heap
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Remove and return the root.
    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let top = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        top
    }

    /// Position of the first live element matching `pred`.
    pub fn position(&self, pred: impl Fn(&T) -> bool) -> Option<usize> {
        self.items.iter().position(pred)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Restore heap order around `index` after its key changed in either direction.
    pub fn shift_down(&mut self, index: usize) {
        if index >= self.items.len() {
            return;
        }
        let index = self.sift_up(index);
        self.sift_down(index);
    }

    /// Live elements in heap order (not sorted).
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    fn sift_up(&mut self, mut index: usize) -> usize {
        while index > 0 {
            let parent = (index - 1) / 2;
            if (self.sinks)(&self.items[parent], &self.items[index]) {
                self.items.swap(parent, index);
                index = parent;
            } else {
                break;
            }
        }
        index
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut top = index;

            if left < len && (self.sinks)(&self.items[top], &self.items[left]) {
                top = left;
            }
            if right < len && (self.sinks)(&self.items[top], &self.items[right]) {
                top = right;
            }
            if top == index {
                break;
            }
            self.items.swap(index, top);
            index = top;
        }
    }
}
