use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("signature scan for {anchor} found {matches} matches, expected exactly one")]
    ScanFailure { anchor: &'static str, matches: usize },

    #[error("{anchor} anchor at {address:#x} plus offset {offset:#x} leaves the address space")]
    AnchorOutOfRange {
        anchor: &'static str,
        address: usize,
        offset: usize,
    },

    #[error("failed to read {length} bytes at {address:#x}: {source}")]
    ReadFailure {
        address: usize,
        length: usize,
        #[source]
        source: io::Error,
    },

    #[error("main module of the target process is unavailable: {0}")]
    ModuleUnavailable(#[source] io::Error),

    #[error("unsupported client executable '{0}'")]
    UnsupportedVariant(String),

    #[error("process {0} has exited")]
    StaleSession(u32),

    #[error("failed to attach: {0}")]
    Attach(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
