use crate::cursor;
use crate::error::Result;

pub const DEFAULT_WINDOW: usize = 1024;
pub const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024 * 1024;

/// Tunables for one overlap search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Rolling checksum window, in bytes.
    pub window: usize,
    /// Block size of each cursor's read buffers. Must be at least `window`.
    pub buffer_capacity: usize,
    /// Shortest file2 prefix a join may consume. `None` means `window`.
    min_overlap: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl SearchConfig {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            min_overlap: None,
        }
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_min_overlap(mut self, bytes: u64) -> Self {
        self.min_overlap = Some(bytes);
        self
    }

    pub fn min_overlap(&self) -> u64 {
        self.min_overlap.unwrap_or(self.window as u64)
    }

    /// Reject configurations no search could run with. The window-vs-file1
    /// check needs file1's length and happens when the footer is primed.
    pub fn validate(&self) -> Result<()> {
        cursor::check_window(self.window, self.buffer_capacity)
    }
}
