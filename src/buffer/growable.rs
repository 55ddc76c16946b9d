//! Auto-expanding byte buffer used to assemble units.

use bytes::Bytes;

use crate::config::BufferConfig;
use crate::error::FrameError;
use crate::util::find_byte;

/// A contiguous byte buffer that grows on demand.
///
/// Capacity starts at [`BufferConfig::small_size`]. While it is below
/// [`BufferConfig::max_size`] it doubles (by at least `small_size`),
/// clamped to `max_size`; once a write needs more than `max_size` the
/// buffer grows exactly to what the write needs.
///
/// The buffer has a single owner and is not synchronized.
///
/// # Example
///
/// ```
/// use flowframe::{BufferConfig, GrowableBuffer};
///
/// let mut buf = GrowableBuffer::with_config(BufferConfig::new(20, 100)?);
/// for _ in 0..80 {
///     buf.push(0x1)?;
/// }
/// assert_eq!(buf.len(), 80);
/// assert!(buf.capacity() >= 80);
/// # Ok::<(), flowframe::FrameError>(())
/// ```
#[derive(Debug)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    capacity: usize,
    config: BufferConfig,
}

impl GrowableBuffer {
    /// Creates an empty buffer with the default thresholds.
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Creates an empty buffer with capacity `config.small_size()`.
    pub fn with_config(config: BufferConfig) -> Self {
        Self {
            data: Vec::with_capacity(config.small_size()),
            capacity: config.small_size(),
            config,
        }
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the current capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the growth thresholds.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Returns the buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Appends a single byte.
    pub fn push(&mut self, byte: u8) -> Result<(), FrameError> {
        self.reserve(1)?;
        self.data.push(byte);
        Ok(())
    }

    /// Appends a slice, growing first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Allocation`] if the allocator cannot satisfy
    /// the growth. The buffer is left unchanged in that case.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Returns the position of the first `byte` at or after `from`.
    pub fn find(&self, byte: u8, from: usize) -> Option<usize> {
        if from >= self.data.len() {
            return None;
        }
        find_byte(&self.data[from..], byte).map(|i| from + i)
    }

    /// Discards the first `cnt` bytes, keeping the rest at the front.
    ///
    /// # Panics
    ///
    /// Panics if `cnt > self.len()`.
    pub fn advance(&mut self, cnt: usize) {
        if cnt < self.data.len() {
            self.data.copy_within(cnt.., 0);
            self.data.truncate(self.data.len() - cnt);
        } else {
            assert_eq!(cnt, self.data.len(), "advance past end of buffer");
            self.data.clear();
        }
    }

    /// Removes and returns everything buffered.
    pub fn take(&mut self) -> Bytes {
        let all = Bytes::copy_from_slice(&self.data);
        self.reset();
        all
    }

    /// Clears the buffer and gives memory back if it grew past `max_size`.
    pub fn reset(&mut self) {
        self.data.clear();
        if self.capacity > self.config.max_size() {
            tracing::debug!(
                capacity = self.capacity,
                small_size = self.config.small_size(),
                "shrinking aggregate buffer"
            );
            self.data.shrink_to(self.config.small_size());
            self.capacity = self.config.small_size();
        }
    }

    /// Makes room for `additional` more bytes.
    fn reserve(&mut self, additional: usize) -> Result<(), FrameError> {
        let required = self.data.len().saturating_add(additional);
        if required > self.capacity {
            let target = self.next_capacity(required);
            self.data
                .try_reserve_exact(target - self.data.len())
                .map_err(|source| FrameError::Allocation {
                    requested: target,
                    source,
                })?;
            self.capacity = target;
        }
        Ok(())
    }

    /// Capacity to grow to so that `required` bytes fit.
    fn next_capacity(&self, required: usize) -> usize {
        let small = self.config.small_size();
        let max = self.config.max_size();

        let mut target = self.capacity.max(small);
        while target < required {
            let grown = target.saturating_mul(2).max(target.saturating_add(small));
            if grown > max {
                // Clamp to the threshold while it still fits; past it, exact fit.
                return if required <= max { max } else { required };
            }
            target = grown;
        }
        target
    }
}

impl Default for GrowableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for GrowableBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
