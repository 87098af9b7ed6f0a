//! Ordered collection of locally selected audio inputs.

use shared::domain::InputItem;
use thiserror::Error;

/// Status shown when nothing is selected.
pub const IDLE_PROMPT: &str = "Select audio samples or paste a URL to get started.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputSetError {
    #[error("input index {index} is out of range for {len} selected inputs")]
    IndexOutOfRange { index: usize, len: usize },
}

pub fn loaded_message(count: usize) -> String {
    format!("Loaded {count} samples. Ready to generate!")
}

/// Inputs keep insertion order; an item's identity is its current position.
///
/// `picker_epoch` advances whenever the set becomes empty so a front end can
/// rebuild its file picker. Pickers otherwise ignore re-selection of the same
/// file.
#[derive(Debug, Clone, Default)]
pub struct InputSet {
    items: Vec<InputItem>,
    picker_epoch: u64,
}

impl InputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, items: impl IntoIterator<Item = InputItem>) {
        self.items.extend(items);
    }

    /// Removes the item at `index`, shifting later items left. Out-of-range
    /// indices leave the set untouched.
    pub fn remove_at(&mut self, index: usize) -> Result<InputItem, InputSetError> {
        if index >= self.items.len() {
            return Err(InputSetError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }

        let removed = self.items.remove(index);
        if self.items.is_empty() {
            self.reset_picker();
        }
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.reset_picker();
    }

    pub fn is_ready(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn status_message(&self) -> String {
        if self.items.is_empty() {
            IDLE_PROMPT.to_string()
        } else {
            loaded_message(self.items.len())
        }
    }

    pub fn items(&self) -> &[InputItem] {
        &self.items
    }

    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|item| item.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn picker_epoch(&self) -> u64 {
        self.picker_epoch
    }

    fn reset_picker(&mut self) {
        self.picker_epoch = self.picker_epoch.wrapping_add(1);
    }
}

#[cfg(test)]
#[path = "tests/input_set_tests.rs"]
mod tests;
