// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Positional interleave join
//!
//! Producers fill disjoint positions of one logical tuple (a BAM and its
//! index, for example). The tuple is emitted once `arity` positions are
//! filled, ordered by position.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use super::{JoinError, JoinTarget, Sealed};

/// Concatenates positional fragments by key
#[derive(Debug)]
pub struct InterleaveJoiner<K, V> {
    target: JoinTarget,
    arity: usize,
    pending: HashMap<K, Vec<Option<V>>>,
    sealed: HashMap<K, Sealed>,
}

impl<K, V> InterleaveJoiner<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    pub fn new(target: JoinTarget, arity: usize) -> Self {
        Self {
            target,
            arity,
            pending: HashMap::new(),
            sealed: HashMap::new(),
        }
    }

    pub fn target(&self) -> JoinTarget {
        self.target
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Offer the value at `position`; returns the ordered tuple once full
    pub fn offer(&mut self, key: K, position: usize, value: V) -> Result<Option<Vec<V>>, JoinError> {
        match self.sealed.get(&key) {
            Some(Sealed::Emitted) => {
                self.sealed.insert(key.clone(), Sealed::Failed);
                return Err(JoinError::DuplicateEmission {
                    key: key.to_string(),
                    slot: position.to_string(),
                });
            }
            Some(Sealed::Failed) => return Err(JoinError::Closed { key: key.to_string() }),
            None => {}
        }

        if position >= self.arity {
            self.discard(&key);
            return Err(JoinError::PositionOutOfRange {
                key: key.to_string(),
                position,
                arity: self.arity,
            });
        }

        let arity = self.arity;
        let fragments = self
            .pending
            .entry(key.clone())
            .or_insert_with(|| (0..arity).map(|_| None).collect());

        if fragments[position].is_some() {
            self.discard(&key);
            return Err(JoinError::DuplicateEmission {
                key: key.to_string(),
                slot: position.to_string(),
            });
        }
        fragments[position] = Some(value);

        if fragments.iter().any(Option::is_none) {
            return Ok(None);
        }

        let tuple = self
            .pending
            .remove(&key)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        self.sealed.insert(key, Sealed::Emitted);
        Ok(Some(tuple))
    }

    /// Drop partial state for a failed key and close it
    fn discard(&mut self, key: &K) {
        self.pending.remove(key);
        self.sealed.insert(key.clone(), Sealed::Failed);
    }

    /// Forget a key whose identity reached its terminal outcome
    pub fn retire(&mut self, key: &K) {
        self.pending.remove(key);
        self.sealed.remove(key);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn sealed_len(&self) -> usize {
        self.sealed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_by_position() {
        let mut joiner = InterleaveJoiner::new(JoinTarget::Alignments, 4);
        let key = "S1".to_string();

        assert!(joiner.offer(key.clone(), 3, "normal.bai").unwrap().is_none());
        assert!(joiner.offer(key.clone(), 0, "tumour.bam").unwrap().is_none());
        assert!(joiner.offer(key.clone(), 2, "normal.bam").unwrap().is_none());
        let tuple = joiner.offer(key.clone(), 1, "tumour.bai").unwrap().unwrap();

        assert_eq!(tuple, vec!["tumour.bam", "tumour.bai", "normal.bam", "normal.bai"]);
        assert_eq!(joiner.pending_len(), 0);
    }

    #[test]
    fn test_duplicate_position_fails_only_that_key() {
        let mut joiner = InterleaveJoiner::new(JoinTarget::Alignments, 2);

        joiner.offer("S1".to_string(), 0, 1).unwrap();
        joiner.offer("S2".to_string(), 0, 1).unwrap();
        let err = joiner.offer("S1".to_string(), 0, 2).unwrap_err();
        assert!(matches!(err, JoinError::DuplicateEmission { .. }));

        assert_eq!(joiner.offer("S2".to_string(), 1, 2).unwrap(), Some(vec![1, 2]));
    }

    #[test]
    fn test_retire_forgets_failed_key() {
        let mut joiner = InterleaveJoiner::new(JoinTarget::Alignments, 2);
        let key = "S1".to_string();

        joiner.offer(key.clone(), 0, 1).unwrap();
        assert!(joiner.offer(key.clone(), 0, 2).is_err());
        assert!(matches!(
            joiner.offer(key.clone(), 1, 3).unwrap_err(),
            JoinError::Closed { .. }
        ));
        assert_eq!(joiner.sealed_len(), 1);

        joiner.retire(&key);
        assert_eq!(joiner.sealed_len(), 0);
        assert_eq!(joiner.pending_len(), 0);
    }

    #[test]
    fn test_position_out_of_range() {
        let mut joiner: InterleaveJoiner<String, u8> = InterleaveJoiner::new(JoinTarget::Alignments, 2);
        let err = joiner.offer("S1".to_string(), 5, 0).unwrap_err();
        assert!(matches!(err, JoinError::PositionOutOfRange { arity: 2, .. }));
    }
}
