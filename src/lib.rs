//! Microphone loudness from an MCP3008 ADC on SPI.
//!
//! [`Mcp3008`] frames single-ended reads, [`Sampler`] turns a window of raw
//! readings into a peak-to-peak level, and [`SamplerWorker`] keeps that
//! busy loop off the caller's thread.

pub mod adc;
pub mod bus;
pub mod device;
pub mod error;
pub mod mock;
pub mod sampler;
pub mod scale;
pub mod worker;

pub use adc::{Channel, Mcp3008};
pub use bus::{BusChannel, SpiBus, SpiSettings};
pub use error::{AdcError, Result};
pub use sampler::{SampleWindow, Sampler};
pub use scale::rescale;
pub use worker::{SampleRequest, SamplerWorker};
