//! Errors returned while loading a config file or buffer.
//!
//! Every variant is fatal to the load attempt that produced it; no partial
//! store is ever handed back alongside one.

use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open config file {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to determine size of config file {path}: {source}")]
    SeekFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to allocate {size} bytes for config buffer")]
    AllocFailed {
        size: u64,
        #[source]
        source: Option<TryReserveError>,
    },

    /// End of stream was reached before the measured file length was read.
    #[error("Incomplete read of config file {path}: expected {expected} bytes, got {read}")]
    IncompleteRead {
        path: PathBuf,
        expected: u64,
        read: u64,
    },

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to allocate entry table for {segments} segments")]
    ParseAllocFailed {
        segments: usize,
        #[source]
        source: TryReserveError,
    },
}

impl LoadError {
    /// The OS error code behind an I/O failure, if there was one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            LoadError::OpenFailed { source, .. }
            | LoadError::SeekFailed { source, .. }
            | LoadError::ReadFailed { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failed_exposes_os_code() {
        let err = LoadError::OpenFailed {
            path: PathBuf::from("/nope"),
            source: io::Error::from_raw_os_error(2),
        };
        assert_eq!(err.raw_os_error(), Some(2));
        assert!(err.to_string().contains("/nope"));
    }

    #[test]
    fn incomplete_read_has_no_os_code() {
        let err = LoadError::IncompleteRead {
            path: PathBuf::from("conf"),
            expected: 10,
            read: 4,
        };
        assert_eq!(err.raw_os_error(), None);
        assert_eq!(
            err.to_string(),
            "Incomplete read of config file conf: expected 10 bytes, got 4"
        );
    }
}
