//! Configuration for framing behavior.
//!
//! - [`BufferConfig`] - Growth thresholds of the aggregate buffer
//! - [`CodecConfig`] - Delimiter, aggregation switches and unit limits
//! - [`PartialUnitPolicy`] - What happens to an unfinished unit at end of stream
//!
//! # Example
//!
//! ```
//! use flowframe::{BufferConfig, CodecConfig};
//!
//! let config = CodecConfig::default()
//!     .with_delimiter(b'\n')
//!     .with_aggregate_on_decode(true)
//!     .with_buffer(BufferConfig::new(64, 4096)?);
//!
//! config.validate()?;
//! # Ok::<(), flowframe::FrameError>(())
//! ```

use crate::error::FrameError;

/// Default small buffer size (16 KiB): initial capacity and growth step.
pub const DEFAULT_SMALL_BUFFER_SIZE: usize = 16 * 1024;

/// Default max buffer size (16 000 KiB): above it growth becomes exact-fit.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 16 * 1000 * 1024;

/// Default unit delimiter.
pub const DEFAULT_DELIMITER: u8 = b'\0';

/// Environment variable read by [`BufferConfig::from_env`] for `small_size`.
pub const SMALL_BUFFER_SIZE_ENV: &str = "FLOWFRAME_SMALL_BUFFER_SIZE";

/// Environment variable read by [`BufferConfig::from_env`] for `max_size`.
pub const MAX_BUFFER_SIZE_ENV: &str = "FLOWFRAME_MAX_BUFFER_SIZE";

/// Growth thresholds for a [`GrowableBuffer`](crate::GrowableBuffer).
///
/// `small_size` is the initial capacity and the minimum growth step.
/// Below `max_size` capacity doubles; past it the buffer grows exactly to
/// what a write needs. `max_size` is a soft threshold, never a cap.
///
/// Thresholds are plain values carried by each buffer, so tests can shrink
/// them without touching any shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferConfig {
    small_size: usize,
    max_size: usize,
}

impl BufferConfig {
    /// Creates a new buffer configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidConfig`] if `small_size` is zero or
    /// greater than `max_size`.
    pub fn new(small_size: usize, max_size: usize) -> Result<Self, FrameError> {
        if small_size == 0 {
            return Err(FrameError::InvalidConfig {
                message: "small buffer size must be non-zero",
            });
        }

        if small_size > max_size {
            return Err(FrameError::InvalidConfig {
                message: "small buffer size cannot be greater than max buffer size",
            });
        }

        Ok(Self {
            small_size,
            max_size,
        })
    }

    /// Reads thresholds from `FLOWFRAME_SMALL_BUFFER_SIZE` and
    /// `FLOWFRAME_MAX_BUFFER_SIZE`, falling back to the defaults for unset
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidConfig`] if a variable is not a number
    /// or the resulting pair is invalid.
    pub fn from_env() -> Result<Self, FrameError> {
        let small_size = read_env_size(SMALL_BUFFER_SIZE_ENV)?.unwrap_or(DEFAULT_SMALL_BUFFER_SIZE);
        let max_size = read_env_size(MAX_BUFFER_SIZE_ENV)?.unwrap_or(DEFAULT_MAX_BUFFER_SIZE);
        Self::new(small_size, max_size)
    }

    /// Sets the small buffer size.
    pub fn with_small_size(mut self, size: usize) -> Self {
        self.small_size = size;
        self
    }

    /// Sets the max buffer size.
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Returns the small buffer size.
    pub fn small_size(&self) -> usize {
        self.small_size
    }

    /// Returns the max buffer size.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Validates the current configuration.
    pub fn validate(&self) -> Result<(), FrameError> {
        Self::new(self.small_size, self.max_size).map(|_| ())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            small_size: DEFAULT_SMALL_BUFFER_SIZE,
            max_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

fn read_env_size(key: &str) -> Result<Option<usize>, FrameError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| FrameError::InvalidConfig {
                message: "buffer size environment variable is not a number",
            }),
        Err(_) => Ok(None),
    }
}

/// Handling of a unit that is still accumulating when upstream completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PartialUnitPolicy {
    /// Drop the bytes and end the stream with
    /// [`FramingError::IncompleteUnit`](crate::FramingError::IncompleteUnit).
    #[default]
    Discard,
    /// Decode the trailing bytes as a final unit.
    Emit,
}

/// Configuration for a [`FramingCodec`](crate::FramingCodec).
///
/// Both aggregation switches default to `false`, in which case each raw
/// chunk is decoded on its own and each value is encoded to its own chunk.
/// The delimiter defaults to `\0`; see [`CodecConfig::without_delimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodecConfig {
    delimiter: Option<u8>,
    aggregate_on_decode: bool,
    aggregate_on_encode: bool,
    buffer: BufferConfig,
    partial_unit: PartialUnitPolicy,
    max_unit_size: Option<usize>,
}

impl CodecConfig {
    /// Creates a configuration with the given delimiter and default settings.
    pub fn new(delimiter: Option<u8>) -> Self {
        Self {
            delimiter,
            ..Self::default()
        }
    }

    /// Sets the delimiter byte.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Disables the delimiter: nothing is appended on encode, nothing is
    /// scanned on decode, and end of stream closes the only unit.
    pub fn without_delimiter(mut self) -> Self {
        self.delimiter = None;
        self
    }

    /// Routes decoding through the aggregating stage.
    pub fn with_aggregate_on_decode(mut self, enabled: bool) -> Self {
        self.aggregate_on_decode = enabled;
        self
    }

    /// Routes encoding through the aggregating stage.
    pub fn with_aggregate_on_encode(mut self, enabled: bool) -> Self {
        self.aggregate_on_encode = enabled;
        self
    }

    /// Sets the aggregate buffer thresholds.
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    /// Sets the policy for a unit left unfinished at completion.
    pub fn with_partial_unit_policy(mut self, policy: PartialUnitPolicy) -> Self {
        self.partial_unit = policy;
        self
    }

    /// Limits the size of a single decoded unit.
    pub fn with_max_unit_size(mut self, max: Option<usize>) -> Self {
        self.max_unit_size = max;
        self
    }

    /// Returns the delimiter, if any.
    pub fn delimiter(&self) -> Option<u8> {
        self.delimiter
    }

    /// Returns whether decoding aggregates raw chunks.
    pub fn aggregate_on_decode(&self) -> bool {
        self.aggregate_on_decode
    }

    /// Returns whether encoding aggregates values.
    pub fn aggregate_on_encode(&self) -> bool {
        self.aggregate_on_encode
    }

    /// Returns the buffer configuration.
    pub fn buffer(&self) -> &BufferConfig {
        &self.buffer
    }

    /// Returns the partial unit policy.
    pub fn partial_unit_policy(&self) -> PartialUnitPolicy {
        self.partial_unit
    }

    /// Returns the unit size limit, if any.
    pub fn max_unit_size(&self) -> Option<usize> {
        self.max_unit_size
    }

    /// Validates the current configuration.
    pub fn validate(&self) -> Result<(), FrameError> {
        self.buffer.validate()?;

        if self.max_unit_size == Some(0) {
            return Err(FrameError::InvalidConfig {
                message: "max unit size must be non-zero",
            });
        }

        Ok(())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            delimiter: Some(DEFAULT_DELIMITER),
            aggregate_on_decode: false,
            aggregate_on_encode: false,
            buffer: BufferConfig::default(),
            partial_unit: PartialUnitPolicy::default(),
            max_unit_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_config_default() {
        let config = BufferConfig::default();
        assert_eq!(config.small_size(), 16 * 1024);
        assert_eq!(config.max_size(), 16 * 1000 * 1024);
    }

    #[test]
    fn test_buffer_config_valid() {
        let config = BufferConfig::new(20, 100).unwrap();
        assert_eq!(config.small_size(), 20);
        assert_eq!(config.max_size(), 100);
    }

    #[test]
    fn test_buffer_config_invalid() {
        assert!(BufferConfig::new(0, 100).is_err());
        assert!(BufferConfig::new(200, 100).is_err());
        assert!(BufferConfig::default().with_small_size(0).validate().is_err());
    }

    #[test]
    fn test_buffer_config_equal_thresholds() {
        assert!(BufferConfig::new(64, 64).is_ok());
    }

    #[test]
    fn test_codec_config_default() {
        let config = CodecConfig::default();
        assert_eq!(config.delimiter(), Some(b'\0'));
        assert!(!config.aggregate_on_decode());
        assert!(!config.aggregate_on_encode());
        assert_eq!(config.partial_unit_policy(), PartialUnitPolicy::Discard);
        assert_eq!(config.max_unit_size(), None);
    }

    #[test]
    fn test_codec_config_builder() {
        let config = CodecConfig::default()
            .with_delimiter(b'\n')
            .with_aggregate_on_decode(true)
            .with_aggregate_on_encode(true)
            .with_partial_unit_policy(PartialUnitPolicy::Emit)
            .with_max_unit_size(Some(1024));

        assert_eq!(config.delimiter(), Some(b'\n'));
        assert!(config.aggregate_on_decode());
        assert!(config.aggregate_on_encode());
        assert_eq!(config.partial_unit_policy(), PartialUnitPolicy::Emit);
        assert_eq!(config.max_unit_size(), Some(1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_codec_config_without_delimiter() {
        let config = CodecConfig::default().without_delimiter();
        assert_eq!(config.delimiter(), None);
        assert_eq!(CodecConfig::new(None), config);
    }

    #[test]
    fn test_codec_config_validate() {
        let config = CodecConfig::default().with_max_unit_size(Some(0));
        assert!(config.validate().is_err());

        let config = CodecConfig::default().with_buffer(BufferConfig::default().with_max_size(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_env_size_unset() {
        assert_eq!(read_env_size("FLOWFRAME_TEST_UNSET_VARIABLE").unwrap(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_codec_config_serde() {
        let config = CodecConfig::default().with_aggregate_on_decode(true);
        let json = serde_json::to_string(&config).unwrap();
        let back: CodecConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
