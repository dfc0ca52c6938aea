//! # Sequencing
//!
//! Sibling pages (within a template) and sibling elements (within a page)
//! carry a dense 1..N `sequence`. These helpers compute the sequence
//! changes; the template service applies them to the store.

use std::str::FromStr;

use crate::error::{ParchmentError, Result};
use crate::model::{ElementRecord, Id, Page};

/// Anything that sits in a 1..N sibling order.
pub trait Sequenced {
    fn id(&self) -> Id;
    fn sequence(&self) -> u32;
    fn set_sequence(&mut self, sequence: u32);
}

impl Sequenced for Page {
    fn id(&self) -> Id {
        self.id
    }
    fn sequence(&self) -> u32 {
        self.sequence
    }
    fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }
}

impl Sequenced for ElementRecord {
    fn id(&self) -> Id {
        self.id
    }
    fn sequence(&self) -> u32 {
        self.sequence
    }
    fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward sequence 1.
    Up,
    /// Toward sequence N.
    Down,
}

impl FromStr for Direction {
    type Err = ParchmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(ParchmentError::InvalidDirection(other.to_string())),
        }
    }
}

/// The sequence a new sibling gets: max + 1, or 1 for the first.
pub fn next_sequence<T: Sequenced>(siblings: &[T]) -> u32 {
    siblings.iter().map(Sequenced::sequence).max().unwrap_or(0) + 1
}

/// The sibling to swap sequences with when moving `item`, if any.
///
/// `None` means the item is already first (moving up) or last (moving
/// down) and the move does nothing.
pub fn find_swap<'a, T: Sequenced>(siblings: &'a [T], item: &T, direction: Direction) -> Option<&'a T> {
    let target = match direction {
        Direction::Up => item.sequence().checked_sub(1)?,
        Direction::Down => item.sequence() + 1,
    };
    siblings
        .iter()
        .find(|s| s.sequence() == target && s.id() != item.id())
}

/// Renumber siblings 1..N in their current order.
///
/// Returns only the items whose sequence changed, so the caller writes
/// back as little as possible.
pub fn resequence<T: Sequenced + Clone>(siblings: &[T]) -> Vec<T> {
    let mut ordered: Vec<&T> = siblings.iter().collect();
    ordered.sort_by_key(|s| (s.sequence(), s.id()));

    let mut changed = Vec::new();
    for (index, item) in ordered.into_iter().enumerate() {
        let sequence = index as u32 + 1;
        if item.sequence() != sequence {
            let mut item = item.clone();
            item.set_sequence(sequence);
            changed.push(item);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: Id,
        sequence: u32,
    }

    impl Sequenced for Item {
        fn id(&self) -> Id {
            self.id
        }
        fn sequence(&self) -> u32 {
            self.sequence
        }
        fn set_sequence(&mut self, sequence: u32) {
            self.sequence = sequence;
        }
    }

    fn items(seqs: &[(Id, u32)]) -> Vec<Item> {
        seqs.iter().map(|&(id, sequence)| Item { id, sequence }).collect()
    }

    #[test]
    fn test_append_builds_dense_range() {
        let mut list: Vec<Item> = Vec::new();
        for id in 1..=5 {
            let sequence = next_sequence(&list);
            list.push(Item { id, sequence });
        }
        let seqs: Vec<u32> = list.iter().map(|i| i.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_find_swap_at_extremes_is_none() {
        let list = items(&[(1, 1), (2, 2), (3, 3)]);
        assert!(find_swap(&list, &list[0], Direction::Up).is_none());
        assert!(find_swap(&list, &list[2], Direction::Down).is_none());
        assert_eq!(find_swap(&list, &list[1], Direction::Up).map(|i| i.id), Some(1));
        assert_eq!(find_swap(&list, &list[1], Direction::Down).map(|i| i.id), Some(3));
    }

    #[test]
    fn test_resequence_closes_gaps() {
        let list = items(&[(7, 5), (3, 2), (9, 9)]);
        let changed = resequence(&list);
        assert_eq!(changed, items(&[(3, 1), (7, 2), (9, 3)]));
    }

    #[test]
    fn test_resequence_dense_list_changes_nothing() {
        assert!(resequence(&items(&[(1, 1), (2, 2)])).is_empty());
        assert!(resequence::<Item>(&[]).is_empty());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("down".parse::<Direction>().unwrap(), Direction::Down);
        assert!(matches!(
            "sideways".parse::<Direction>(),
            Err(ParchmentError::InvalidDirection(d)) if d == "sideways"
        ));
    }
}
