use std::collections::BTreeSet;

use crate::session::WorkflowError;

/// Row indices chosen for insertion. Every index is a valid offset into the
/// row sequence the selection was created for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    len: usize,
    selected: BTreeSet<usize>,
}

impl Selection {
    pub fn none(len: usize) -> Self {
        Self { len, selected: BTreeSet::new() }
    }

    pub fn all(len: usize) -> Self {
        Self { len, selected: (0..len).collect() }
    }

    pub fn select_all(&mut self) {
        self.selected = (0..self.len).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn set(&mut self, index: usize, included: bool) -> Result<(), WorkflowError> {
        self.check(index)?;
        if included {
            self.selected.insert(index);
        } else {
            self.selected.remove(&index);
        }
        Ok(())
    }

    /// Flips one row and returns whether it is now selected.
    pub fn toggle(&mut self, index: usize) -> Result<bool, WorkflowError> {
        self.check(index)?;
        if self.selected.remove(&index) {
            Ok(false)
        } else {
            self.selected.insert(index);
            Ok(true)
        }
    }

    /// Replaces the selection with exactly `indices`. Nothing changes if
    /// any index is out of range.
    pub fn replace<I: IntoIterator<Item = usize>>(&mut self, indices: I) -> Result<(), WorkflowError> {
        let next: BTreeSet<usize> = indices.into_iter().collect();
        if let Some(&bad) = next.iter().find(|&&i| i >= self.len) {
            return Err(WorkflowError::RowOutOfRange { index: bad, len: self.len });
        }
        self.selected = next;
        Ok(())
    }

    pub fn contains(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Number of rows the selection ranges over.
    pub fn row_count(&self) -> usize {
        self.len
    }

    /// Selected indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().copied()
    }

    fn check(&self, index: usize) -> Result<(), WorkflowError> {
        if index < self.len {
            Ok(())
        } else {
            Err(WorkflowError::RowOutOfRange { index, len: self.len })
        }
    }
}
