use log::warn;
use rppal::spi::{Mode, Spi};
use std::sync::{Arc, Mutex};

use crate::error::{AdcError, Result};

/// A connected synchronous serial channel.
pub trait BusChannel: Send {
    /// Clocks `write` out while filling `read`. Both buffers have the same length.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<()>;
}

impl BusChannel for Spi {
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<()> {
        let transferred = Spi::transfer(&*self, read, write)
            .map_err(|e| AdcError::TransferFailure(e.to_string()))?;

        if transferred != write.len() {
            return Err(AdcError::TransferFailure(format!(
                "short transfer, {} of {} bytes",
                transferred,
                write.len()
            )));
        }
        Ok(())
    }
}

/// Clock, mode and word size applied when a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiSettings {
    pub clock_speed: u32,
    pub mode: Mode,
    pub bits_per_word: u8,
}

/// A thread-safe handle to a single bus.
///
/// Clones share the same device; every transfer holds the lock for the whole
/// frame so transfers from different callers never interleave.
pub struct SpiBus<B> {
    inner: Arc<Mutex<B>>,
}

impl<B> Clone for SpiBus<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: BusChannel> SpiBus<B> {
    pub fn new(bus: B) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bus)),
        }
    }

    pub fn transfer(&self, read: &mut [u8], write: &[u8]) -> Result<()> {
        let mut bus = self.inner.lock().map_err(|_| {
            warn!("SPI bus lock poisoned");
            AdcError::TransferFailure("bus lock poisoned".to_string())
        })?;
        bus.transfer(read, write)
    }

    /// Runs `f` against the underlying device while holding the bus lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&B) -> R) -> Result<R> {
        let bus = self
            .inner
            .lock()
            .map_err(|_| AdcError::TransferFailure("bus lock poisoned".to_string()))?;
        Ok(f(&bus))
    }
}
