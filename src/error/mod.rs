//! Error types for flowframe.

use std::collections::TryReserveError;
use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error raised by a unit codec or an upstream party.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can terminate a framed stream.
#[derive(Debug, Error)]
pub enum FrameError {
    /// An I/O error occurred while reading raw input.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The aggregate buffer could not grow.
    #[error("allocation failed: could not grow buffer to {requested} bytes")]
    Allocation {
        /// The capacity that was requested.
        requested: usize,
        /// The allocator's report.
        #[source]
        source: TryReserveError,
    },

    /// The byte stream could not be split into whole units.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// The unit codec rejected a unit or a value.
    #[error("codec error: {0}")]
    Codec(#[source] BoxError),

    /// Error signalled by the upstream publisher.
    #[error("upstream error: {0}")]
    Upstream(#[source] BoxError),

    /// Invalid configuration parameter.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of what was invalid.
        message: &'static str,
    },
}

impl FrameError {
    /// Wraps a codec failure.
    pub fn codec(err: impl Into<BoxError>) -> Self {
        FrameError::Codec(err.into())
    }

    /// Wraps a failure reported by the upstream party.
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        FrameError::Upstream(err.into())
    }

    /// Returns the framing failure, if this is one.
    pub fn as_framing(&self) -> Option<&FramingError> {
        match self {
            FrameError::Framing(e) => Some(e),
            _ => None,
        }
    }
}

/// Ways a byte stream can fail to frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// The stream completed while a unit was still accumulating.
    #[error("stream ended inside an incomplete unit ({buffered} bytes buffered)")]
    IncompleteUnit {
        /// Bytes held by the unfinished unit.
        buffered: usize,
    },

    /// A unit grew past the configured limit before its delimiter arrived.
    #[error("unit too large: {actual} bytes (max {max})")]
    UnitTooLarge {
        /// Size reached by the unit.
        actual: usize,
        /// The configured maximum.
        max: usize,
    },

    /// An encoded value contains the delimiter and would split on decode.
    #[error("encoded value contains delimiter byte {delimiter:#04x}")]
    DelimiterInPayload {
        /// The configured delimiter.
        delimiter: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: FrameError = io_err.into();
        assert!(matches!(err, FrameError::Io(_)));
    }

    #[test]
    fn test_framing_conversion() {
        let err: FrameError = FramingError::IncompleteUnit { buffered: 3 }.into();
        assert_eq!(
            err.as_framing(),
            Some(&FramingError::IncompleteUnit { buffered: 3 })
        );
    }

    #[test]
    fn test_display() {
        let err = FrameError::Framing(FramingError::UnitTooLarge {
            actual: 100,
            max: 50,
        });
        assert!(err.to_string().contains("unit too large"));

        let err = FramingError::DelimiterInPayload { delimiter: 0 };
        assert!(err.to_string().contains("0x00"));
    }

    #[test]
    fn test_allocation_source() {
        let source = Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err();
        let err = FrameError::Allocation {
            requested: usize::MAX,
            source,
        };
        assert!(StdError::source(&err).is_some());
    }
}
