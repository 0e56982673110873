//! The owning buffer (C2): [`OwningBuffer`].

use crate::buf::RefBuffer;

/// A heap-allocated byte buffer the crate owns outright, used where an
/// intent needs storage that outlives the call that created it (e.g. a
/// `recv` into a buffer the caller hasn't supplied storage for, or the
/// reactor's own scratch space).
///
/// Distinct from [`RefBuffer`], which only ever borrows; `OwningBuffer`
/// allocates and frees its own storage and can grow.
#[derive(Debug, Default, Clone)]
pub struct OwningBuffer {
    data: Vec<u8>,
}

impl OwningBuffer {
    pub fn new() -> OwningBuffer {
        OwningBuffer { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> OwningBuffer {
        OwningBuffer {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Zero-filled buffer of exactly `len` bytes, ready to receive into.
    pub fn zeroed(len: usize) -> OwningBuffer {
        OwningBuffer { data: vec![0u8; len] }
    }

    /// Copy `data` into a freshly allocated buffer.
    pub fn from_slice(data: &[u8]) -> OwningBuffer {
        OwningBuffer { data: data.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.data.extend_from_slice(other);
    }

    /// Borrow the whole buffer as a [`RefBuffer`] for a single-slice I/O call.
    pub fn as_ref_buffer(&mut self) -> RefBuffer<'_> {
        RefBuffer::from_mut_slice(&mut self.data)
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for OwningBuffer {
    fn from(data: Vec<u8>) -> OwningBuffer {
        OwningBuffer { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_has_requested_length() {
        let buf = OwningBuffer::zeroed(16);
        assert_eq!(buf.len(), 16);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn as_ref_buffer_views_the_whole_allocation() {
        let mut buf = OwningBuffer::from(vec![1, 2, 3]);
        let view = buf.as_ref_buffer();
        assert_eq!(view.len(), 3);
    }
}
