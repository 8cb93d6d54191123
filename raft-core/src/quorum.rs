//! Strict-majority predicate over a boolean vote vector.

/// `true` iff more than half (integer division) of `votes` are `true`.
pub fn majority(votes: &[bool]) -> bool {
    let granted = votes.iter().filter(|v| **v).count();
    granted > votes.len() / 2
}
