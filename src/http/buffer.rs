use bytes::{Buf, BytesMut};

/// Initial capacity of a connection read buffer.
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Growable byte buffer used on the read side of a connection.
///
/// Growth at least doubles the capacity, so a sequence of appends costs
/// amortized constant time per byte.
#[derive(Debug)]
pub struct Buffer {
    inner: BytesMut,
}

impl Buffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, data: &[u8]) {
        self.ensure_space(data.len());
        self.inner.extend_from_slice(data);
    }

    /// Drops the first `n` bytes, keeping anything buffered after them.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.inner.len());
        self.inner.advance(n);
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn ensure_space(&mut self, additional: usize) {
        let len = self.inner.len();
        let capacity = self.inner.capacity();

        if len + additional > capacity {
            let target = (capacity * 2).max(len + additional);
            self.inner.reserve(target - len);
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
