// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Strict join: every declared slot must be supplied

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use super::{JoinError, JoinTarget, Sealed, SlotSet};

/// A complete tuple for one key
#[derive(Debug, Clone, PartialEq)]
pub struct Joined<K, S: Ord, V> {
    key: K,
    values: BTreeMap<S, V>,
}

impl<K, S: SlotSet, V> Joined<K, S, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn get(&self, slot: S) -> Option<&V> {
        self.values.get(&slot)
    }

    /// Remove one slot's value
    pub fn take(&mut self, slot: S) -> Option<V> {
        self.values.remove(&slot)
    }
}

/// Joins values from every slot of `S` by key
#[derive(Debug)]
pub struct StrictJoiner<K, S, V> {
    target: JoinTarget,
    pending: HashMap<K, BTreeMap<S, V>>,
    sealed: HashMap<K, Sealed>,
}

impl<K, S, V> StrictJoiner<K, S, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    S: SlotSet,
{
    pub fn new(target: JoinTarget) -> Self {
        Self {
            target,
            pending: HashMap::new(),
            sealed: HashMap::new(),
        }
    }

    pub fn target(&self) -> JoinTarget {
        self.target
    }

    /// Offer one slot's value; returns the tuple once it is complete
    pub fn offer(&mut self, key: K, slot: S, value: V) -> Result<Option<Joined<K, S, V>>, JoinError> {
        match self.sealed.get(&key) {
            Some(Sealed::Emitted) => {
                self.sealed.insert(key.clone(), Sealed::Failed);
                return Err(JoinError::DuplicateEmission {
                    key: key.to_string(),
                    slot: slot.to_string(),
                });
            }
            Some(Sealed::Failed) => {
                return Err(JoinError::Closed { key: key.to_string() });
            }
            None => {}
        }

        let slots = self.pending.entry(key.clone()).or_default();
        if slots.contains_key(&slot) {
            self.discard(&key);
            return Err(JoinError::DuplicateEmission {
                key: key.to_string(),
                slot: slot.to_string(),
            });
        }
        slots.insert(slot, value);

        if slots.len() < S::all().len() {
            return Ok(None);
        }

        let values = self.pending.remove(&key).unwrap_or_default();
        self.sealed.insert(key.clone(), Sealed::Emitted);
        Ok(Some(Joined { key, values }))
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

    /// Number of keys holding partial state
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of keys remembered as emitted or failed
    pub fn sealed_len(&self) -> usize {
        self.sealed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Slot {
        Left,
        Middle,
        Right,
    }

    impl fmt::Display for Slot {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl SlotSet for Slot {
        fn all() -> &'static [Self] {
            &[Slot::Left, Slot::Middle, Slot::Right]
        }
    }

    fn joiner() -> StrictJoiner<String, Slot, u32> {
        StrictJoiner::new(JoinTarget::PurpleInputs)
    }

    #[test]
    fn test_emits_once_complete_in_any_order() {
        let mut joiner = joiner();
        let key = "a".to_string();

        assert!(joiner.offer(key.clone(), Slot::Right, 3).unwrap().is_none());
        assert!(joiner.offer(key.clone(), Slot::Left, 1).unwrap().is_none());
        let joined = joiner.offer(key.clone(), Slot::Middle, 2).unwrap().unwrap();

        assert_eq!(joined.key(), "a");
        assert_eq!(joined.get(Slot::Left), Some(&1));
        assert_eq!(joined.get(Slot::Right), Some(&3));
        assert_eq!(joiner.pending_len(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut joiner = joiner();

        joiner.offer("a".to_string(), Slot::Left, 1).unwrap();
        joiner.offer("b".to_string(), Slot::Left, 10).unwrap();
        joiner.offer("b".to_string(), Slot::Middle, 20).unwrap();
        let joined = joiner.offer("b".to_string(), Slot::Right, 30).unwrap().unwrap();

        assert_eq!(joined.get(Slot::Left), Some(&10));
        assert_eq!(joiner.pending_len(), 1);
    }

    #[test]
    fn test_duplicate_slot_fails_key() {
        let mut joiner = joiner();
        let key = "a".to_string();

        joiner.offer(key.clone(), Slot::Left, 1).unwrap();
        let err = joiner.offer(key.clone(), Slot::Left, 2).unwrap_err();
        assert_eq!(
            err,
            JoinError::DuplicateEmission {
                key: "a".into(),
                slot: "Left".into()
            }
        );
        assert_eq!(joiner.pending_len(), 0);

        // Closed until retired
        let err = joiner.offer(key.clone(), Slot::Middle, 2).unwrap_err();
        assert!(matches!(err, JoinError::Closed { .. }));
    }

    #[test]
    fn test_offer_after_emission_is_duplicate() {
        let mut joiner = joiner();
        let key = "a".to_string();

        for (slot, value) in [(Slot::Left, 1), (Slot::Middle, 2), (Slot::Right, 3)] {
            joiner.offer(key.clone(), slot, value).unwrap();
        }

        let err = joiner.offer(key.clone(), Slot::Middle, 9).unwrap_err();
        assert!(matches!(err, JoinError::DuplicateEmission { .. }));
    }

    #[test]
    fn test_retire_releases_memory() {
        let mut joiner = joiner();
        let key = "a".to_string();

        for (slot, value) in [(Slot::Left, 1), (Slot::Middle, 2), (Slot::Right, 3)] {
            joiner.offer(key.clone(), slot, value).unwrap();
        }
        assert_eq!(joiner.sealed_len(), 1);

        joiner.retire(&key);
        assert_eq!(joiner.sealed_len(), 0);
        assert_eq!(joiner.pending_len(), 0);
    }

    #[test]
    fn test_retire_forgets_failed_key() {
        let mut joiner = joiner();
        let key = "a".to_string();

        joiner.offer(key.clone(), Slot::Left, 1).unwrap();
        assert!(joiner.offer(key.clone(), Slot::Left, 2).is_err());
        assert_eq!(joiner.sealed_len(), 1);
        assert_eq!(joiner.pending_len(), 0);

        joiner.retire(&key);
        assert_eq!(joiner.sealed_len(), 0);
    }
}
