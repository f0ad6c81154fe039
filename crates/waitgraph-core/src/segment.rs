//! # Segment Encoding
//!
//! Reporters ship their local wait-for edges as a flat list of words:
//!
//! ```text
//! source target* 0  source target* 0  ...
//! ```
//!
//! Each segment names a waiting transaction followed by every transaction it
//! waits for, closed by the terminator `0`. An immediate `0` after the source
//! means the source currently waits for nothing. An empty list is an empty
//! subgraph.
//!
//! Parsing validates the whole input before the graph is touched, so a
//! malformed submission is rejected without partial mutation.

use crate::primitives::SEGMENT_TERMINATOR;
use crate::{TransactionId, WaitGraphError};

// =============================================================================
// PARSED FORM
// =============================================================================

/// One source and the targets it waits for, borrowed from the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    source: TransactionId,
    targets: &'a [u64],
}

impl<'a> Segment<'a> {
    /// The waiting transaction.
    #[must_use]
    pub fn source(&self) -> TransactionId {
        self.source
    }

    /// The transactions `source` waits for, in encoded order.
    pub fn targets(self) -> impl Iterator<Item = TransactionId> + 'a {
        // Parsing stopped each run at the first terminator, so every word
        // here is non-zero.
        self.targets.iter().filter_map(|&word| TransactionId::new(word))
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the source waits for nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// A validated subgraph encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subgraph<'a> {
    segments: Vec<Segment<'a>>,
    edge_count: usize,
}

impl<'a> Subgraph<'a> {
    /// Validate and split an encoded subgraph.
    ///
    /// # Errors
    /// - `SubgraphTooLarge` if `encoded` is longer than `max_words`
    /// - `MalformedSubgraph` if a segment starts with `0` or the last
    ///   segment has no terminator
    pub fn parse(encoded: &'a [u64], max_words: usize) -> Result<Self, WaitGraphError> {
        if encoded.len() > max_words {
            return Err(WaitGraphError::SubgraphTooLarge {
                words: encoded.len(),
                max: max_words,
            });
        }

        let mut segments = Vec::new();
        let mut edge_count = 0usize;
        let mut pos = 0usize;

        while pos < encoded.len() {
            let Some(source) = TransactionId::new(encoded[pos]) else {
                return Err(WaitGraphError::MalformedSubgraph {
                    offset: pos,
                    reason: "segment source is the reserved identifier 0",
                });
            };

            let rest = &encoded[pos + 1..];
            let Some(run) = rest.iter().position(|&word| word == SEGMENT_TERMINATOR) else {
                return Err(WaitGraphError::MalformedSubgraph {
                    offset: encoded.len(),
                    reason: "missing segment terminator",
                });
            };

            segments.push(Segment {
                source,
                targets: &rest[..run],
            });
            edge_count += run;
            pos += run + 2;
        }

        Ok(Self {
            segments,
            edge_count,
        })
    }

    /// Segments in encoded order.
    #[must_use]
    pub fn segments(&self) -> &[Segment<'a>] {
        &self.segments
    }

    /// Total number of edges described.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Upper bound on distinct transactions referenced.
    #[must_use]
    pub fn vertex_bound(&self) -> usize {
        self.edge_count + self.segments.len()
    }

    /// Whether the subgraph describes no edges at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Incremental builder for the segment encoding.
///
/// ```
/// use waitgraph_core::{SubgraphBuilder, TransactionId};
///
/// let t = |raw| TransactionId::new(raw).expect("non-zero");
/// let words = SubgraphBuilder::new()
///     .segment(t(1), &[t(2), t(3)])
///     .segment(t(4), &[])
///     .build();
/// assert_eq!(words, vec![1, 2, 3, 0, 4, 0]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubgraphBuilder {
    words: Vec<u64>,
}

impl SubgraphBuilder {
    /// Start an empty subgraph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment: `source` waits for each of `targets`.
    #[must_use]
    pub fn segment(mut self, source: TransactionId, targets: &[TransactionId]) -> Self {
        self.words.reserve(targets.len() + 2);
        self.words.push(source.get());
        self.words.extend(targets.iter().map(|t| t.get()));
        self.words.push(SEGMENT_TERMINATOR);
        self
    }

    /// Append a single edge as its own segment.
    #[must_use]
    pub fn edge(self, source: TransactionId, target: TransactionId) -> Self {
        self.segment(source, &[target])
    }

    /// Finish and return the encoded words.
    #[must_use]
    pub fn build(self) -> Vec<u64> {
        self.words
    }
}

/// Encode a list of edges, grouping consecutive edges of the same source
/// into one segment.
#[must_use]
pub fn encode_edges(edges: &[(TransactionId, TransactionId)]) -> Vec<u64> {
    let mut words = Vec::with_capacity(edges.len() * 3);
    let mut current: Option<TransactionId> = None;

    for &(source, target) in edges {
        if current != Some(source) {
            if current.is_some() {
                words.push(SEGMENT_TERMINATOR);
            }
            words.push(source.get());
            current = Some(source);
        }
        words.push(target.get());
    }
    if current.is_some() {
        words.push(SEGMENT_TERMINATOR);
    }
    words
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    fn xid(raw: u64) -> TransactionId {
        TransactionId::new(raw).expect("non-zero")
    }

    #[test]
    fn parse_empty_input() {
        let subgraph = Subgraph::parse(&[], MAX).expect("parse");
        assert!(subgraph.segments().is_empty());
        assert!(subgraph.is_empty());
    }

    #[test]
    fn parse_multiple_segments() {
        let words = [1, 2, 3, 0, 4, 0, 5, 1, 0];
        let subgraph = Subgraph::parse(&words, MAX).expect("parse");

        assert_eq!(subgraph.segments().len(), 3);
        assert_eq!(subgraph.edge_count(), 3);

        let first = subgraph.segments()[0];
        assert_eq!(first.source(), xid(1));
        assert_eq!(first.targets().collect::<Vec<_>>(), vec![xid(2), xid(3)]);

        let second = subgraph.segments()[1];
        assert_eq!(second.source(), xid(4));
        assert!(second.is_empty());
    }

    #[test]
    fn parse_rejects_missing_terminator() {
        let err = Subgraph::parse(&[1, 2, 0, 3, 4], MAX).expect_err("malformed");
        assert_eq!(
            err,
            WaitGraphError::MalformedSubgraph {
                offset: 5,
                reason: "missing segment terminator",
            }
        );
    }

    #[test]
    fn parse_rejects_lone_source() {
        assert!(Subgraph::parse(&[7], MAX).is_err());
    }

    #[test]
    fn parse_rejects_zero_source() {
        let err = Subgraph::parse(&[1, 2, 0, 0], MAX).expect_err("malformed");
        assert!(matches!(
            err,
            WaitGraphError::MalformedSubgraph { offset: 3, .. }
        ));
    }

    #[test]
    fn parse_rejects_oversized_input() {
        let words = vec![1, 2, 0, 3, 4, 0];
        let err = Subgraph::parse(&words, 4).expect_err("too large");
        assert_eq!(err, WaitGraphError::SubgraphTooLarge { words: 6, max: 4 });
    }

    #[test]
    fn builder_matches_hand_encoding() {
        let words = SubgraphBuilder::new()
            .edge(xid(1), xid(2))
            .segment(xid(2), &[xid(3), xid(4)])
            .build();
        assert_eq!(words, vec![1, 2, 0, 2, 3, 4, 0]);
    }

    #[test]
    fn encode_edges_groups_by_source() {
        let words = encode_edges(&[(xid(1), xid(2)), (xid(1), xid(3)), (xid(2), xid(3))]);
        assert_eq!(words, vec![1, 2, 3, 0, 2, 3, 0]);
        assert!(encode_edges(&[]).is_empty());

        let parsed = Subgraph::parse(&words, MAX).expect("parse");
        assert_eq!(parsed.edge_count(), 3);
    }
}
