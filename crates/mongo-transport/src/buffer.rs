//! Ordered, read-only view over several byte regions.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

use crate::pool::BufferPool;

/// Several [`Bytes`] regions read as one logical sequence.
///
/// A completed read hands out one of these. The regions keep the storage
/// they arrived in; nothing is copied unless [`into_bytes`](Self::into_bytes)
/// has to join more than one region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeBuffer {
    regions: VecDeque<Bytes>,
    len: usize,
}

impl CompositeBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a region. Empty regions are dropped.
    pub fn push(&mut self, region: Bytes) {
        if region.is_empty() {
            return;
        }
        self.len += region.len();
        self.regions.push_back(region);
    }

    /// Total bytes across regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of regions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Iterate over regions in order.
    pub fn regions(&self) -> impl Iterator<Item = &Bytes> {
        self.regions.iter()
    }

    /// Join into one contiguous `Bytes`.
    ///
    /// A single region is returned as is; several are copied once.
    #[must_use]
    pub fn into_bytes(mut self) -> Bytes {
        match self.regions.len() {
            0 => Bytes::new(),
            1 => self.regions.pop_front().unwrap_or_default(),
            _ => {
                let mut joined = BytesMut::with_capacity(self.len);
                for region in &self.regions {
                    joined.extend_from_slice(region);
                }
                joined.freeze()
            }
        }
    }

    /// Copy every byte into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for region in &self.regions {
            out.extend_from_slice(region);
        }
        out
    }

    /// Give the regions' storage back to `pool` where nothing else shares it.
    pub fn release_into(self, pool: &BufferPool) {
        for region in self.regions {
            pool.release_bytes(region);
        }
    }
}

impl From<Vec<Bytes>> for CompositeBuffer {
    fn from(regions: Vec<Bytes>) -> Self {
        regions.into_iter().collect()
    }
}

impl FromIterator<Bytes> for CompositeBuffer {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        let mut buf = Self::new();
        for region in iter {
            buf.push(region);
        }
        buf
    }
}

impl Buf for CompositeBuffer {
    fn remaining(&self) -> usize {
        self.len
    }

    fn chunk(&self) -> &[u8] {
        self.regions.front().map(|r| &r[..]).unwrap_or(&[])
    }

    fn advance(&mut self, mut cnt: usize) {
        assert!(cnt <= self.len, "advance past end of composite buffer");
        self.len -= cnt;
        while cnt > 0 {
            let Some(front) = self.regions.front_mut() else {
                break;
            };
            if cnt < front.len() {
                front.advance(cnt);
                break;
            }
            cnt -= front.len();
            self.regions.pop_front();
        }
    }

    fn chunks_vectored<'a>(&'a self, dst: &mut [std::io::IoSlice<'a>]) -> usize {
        let mut n = 0;
        for (slot, region) in dst.iter_mut().zip(&self.regions) {
            *slot = std::io::IoSlice::new(region);
            n += 1;
        }
        n
    }
}
