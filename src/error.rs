use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdcError {
    /// Nothing was enumerated for the bus descriptor.
    #[error("no SPI device found for '{0}'")]
    NoDeviceFound(String),

    #[error("invalid bus descriptor '{0}'")]
    InvalidDescriptor(String),

    /// The device exists but could not be opened or configured.
    #[error("SPI configuration failed: {0}")]
    Configuration(String),

    /// A full-duplex transfer did not complete.
    #[error("SPI transfer failed: {0}")]
    TransferFailure(String),

    #[error("invalid channel {0}, must be 0-7")]
    InvalidChannel(u8),

    #[error("invalid scale maximum {0}, must be >= 0")]
    InvalidScale(i32),

    #[error("empty source range, both bounds are {0}")]
    EmptySourceRange(i32),

    #[error("rescaled value does not fit in an i32")]
    ScaleOverflow,

    #[error("sampler worker has stopped")]
    WorkerStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AdcError>;
