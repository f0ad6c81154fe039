//! # Vertex Index
//!
//! Hash-chained map from [`TransactionId`] to vertex handle.
//!
//! The bucket count is fixed at construction. Each bucket heads a singly
//! linked chain threaded through [`Vertex::next_in_bucket`], so the index
//! itself stores one optional handle per bucket and nothing per vertex.

use crate::TransactionId;
use crate::graph::{Vertex, VertexHandle};
use crate::pool::Pool;

/// Bucketed lookup from transaction identifier to vertex.
#[derive(Debug, Clone)]
pub struct VertexIndex {
    buckets: Vec<Option<VertexHandle>>,
    len: usize,
}

impl VertexIndex {
    /// Create an index with `bucket_count` chains (at least one).
    #[must_use]
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: vec![None; bucket_count.max(1)],
            len: 0,
        }
    }

    fn bucket_of(&self, xid: TransactionId) -> usize {
        (xid.get() % self.buckets.len() as u64) as usize
    }

    /// Look up the vertex of `xid` without creating it.
    #[must_use]
    pub fn find(&self, vertices: &Pool<Vertex>, xid: TransactionId) -> Option<VertexHandle> {
        let mut cursor = self.buckets[self.bucket_of(xid)];
        while let Some(handle) = cursor {
            let vertex = vertices.get(handle);
            if vertex.xid == xid {
                return Some(handle);
            }
            cursor = vertex.next_in_bucket;
        }
        None
    }

    /// Look up the vertex of `xid`, creating an isolated one if absent.
    ///
    /// New vertices start with no incoming and no outgoing edges and are
    /// linked at the head of their chain.
    pub fn find_or_insert(&mut self, vertices: &mut Pool<Vertex>, xid: TransactionId) -> VertexHandle {
        if let Some(handle) = self.find(vertices, xid) {
            return handle;
        }

        let bucket = self.bucket_of(xid);
        let handle = vertices.acquire(Vertex::new(xid, self.buckets[bucket]));
        self.buckets[bucket] = Some(handle);
        self.len += 1;
        handle
    }

    /// Unlink a vertex from its chain and release it to the pool.
    pub fn remove(&mut self, vertices: &mut Pool<Vertex>, handle: VertexHandle) {
        let (xid, next) = {
            let vertex = vertices.get(handle);
            (vertex.xid, vertex.next_in_bucket)
        };
        let bucket = self.bucket_of(xid);

        if self.buckets[bucket] == Some(handle) {
            self.buckets[bucket] = next;
        } else {
            let mut cursor = self.buckets[bucket];
            while let Some(current) = cursor {
                let vertex = vertices.get_mut(current);
                if vertex.next_in_bucket == Some(handle) {
                    vertex.next_in_bucket = next;
                    break;
                }
                cursor = vertex.next_in_bucket;
            }
        }

        vertices.release(handle);
        self.len = self.len.saturating_sub(1);
    }

    /// Number of indexed vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of hash buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Length of the longest bucket chain.
    #[must_use]
    pub fn longest_chain(&self, vertices: &Pool<Vertex>) -> usize {
        self.buckets
            .iter()
            .map(|head| {
                let mut length = 0;
                let mut cursor = *head;
                while let Some(handle) = cursor {
                    length += 1;
                    cursor = vertices.get(handle).next_in_bucket;
                }
                length
            })
            .max()
            .unwrap_or(0)
    }
}

// =============================================================================
// TESTS
// =============================================================================
