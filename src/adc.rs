use log::info;
use rppal::spi::{Mode, Spi};
use std::fmt;

use crate::bus::{BusChannel, SpiBus, SpiSettings};
use crate::device::{self, DeviceEnumerator, SpidevEnumerator};
use crate::error::{AdcError, Result};

pub const ADC_CHANNELS: u8 = 8;
pub const MAX_READING: u16 = 1023;

/// Bus settings the MCP3008 needs: 3.6 MHz, mode 0, 8-bit words.
pub const MCP3008_SETTINGS: SpiSettings = SpiSettings {
    clock_speed: 3_600_000,
    mode: Mode::Mode0,
    bits_per_word: 8,
};

const START_BIT: u8 = 0x01;
const SINGLE_ENDED: u8 = 0b1000;

/// A single-ended input, 0-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    pub fn new(index: u8) -> Result<Self> {
        if index >= ADC_CHANNELS {
            return Err(AdcError::InvalidChannel(index));
        }
        Ok(Channel(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = AdcError;

    fn try_from(index: u8) -> Result<Self> {
        Channel::new(index)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.0)
    }
}

/// Start bit, then single-ended mode and the channel in the high nibble,
/// then a padding byte that clocks out the low result bits.
pub fn command_frame(channel: Channel) -> [u8; 3] {
    [START_BIT, (SINGLE_ENDED | channel.0) << 4, 0x00]
}

/// Two result bits sit at the bottom of the second byte, the remaining eight
/// fill the third.
pub fn decode_reading(rx: &[u8; 3]) -> u16 {
    (((rx[1] & 0x03) as u16) << 8) | (rx[2] as u16)
}

pub struct Mcp3008<B> {
    bus: SpiBus<B>,
}

impl<B> Clone for Mcp3008<B> {
    fn clone(&self) -> Self {
        Mcp3008 {
            bus: self.bus.clone(),
        }
    }
}

impl Mcp3008<Spi> {
    /// Opens the first spidev node on the described bus.
    pub fn connect(descriptor: &str) -> Result<Self> {
        Self::connect_with(&SpidevEnumerator::default(), descriptor)
    }
}

impl<B: BusChannel> Mcp3008<B> {
    pub fn new(bus: SpiBus<B>) -> Self {
        Mcp3008 { bus }
    }

    pub fn connect_with<E>(enumerator: &E, descriptor: &str) -> Result<Self>
    where
        E: DeviceEnumerator<Device = B>,
    {
        let device = device::open_first(enumerator, descriptor, &MCP3008_SETTINGS)?;
        info!("MCP3008 ADC initialized on {}", descriptor);
        Ok(Mcp3008::new(SpiBus::new(device)))
    }

    pub fn bus(&self) -> &SpiBus<B> {
        &self.bus
    }

    pub fn read(&self, channel: Channel) -> Result<u16> {
        let tx_buffer = command_frame(channel);
        let mut rx_buffer = [0u8; 3];

        self.bus.transfer(&mut rx_buffer, &tx_buffer)?;

        Ok(decode_reading(&rx_buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedBus;

    fn adc(bus: ScriptedBus) -> Mcp3008<ScriptedBus> {
        Mcp3008::new(SpiBus::new(bus))
    }

    #[test]
    fn channel_bounds() {
        for index in 0..8 {
            assert_eq!(Channel::new(index).unwrap().index(), index);
        }
        assert!(matches!(Channel::new(8), Err(AdcError::InvalidChannel(8))));
        assert!(Channel::try_from(255).is_err());
    }

    #[test]
    fn config_byte_per_channel() {
        for index in 0..8u8 {
            let frame = command_frame(Channel::new(index).unwrap());
            assert_eq!(frame[0], 0x01);
            assert_eq!(frame[1], (8 + index) << 4);
            assert_eq!(frame[2], 0x00);
        }
    }

    #[test]
    fn decode_ignores_high_bits() {
        assert_eq!(decode_reading(&[0x00, 0x02, 0xFF]), 767);
        assert_eq!(decode_reading(&[0xFF, 0xFF, 0xFF]), MAX_READING);
        assert_eq!(decode_reading(&[0xFF, 0xFC, 0x00]), 0);
        for b1 in [0x00u8, 0x01, 0x03, 0x7D, 0xFE] {
            for b2 in [0x00u8, 0x10, 0xAA, 0xFF] {
                let value = decode_reading(&[0, b1, b2]);
                assert_eq!(value, (((b1 & 3) as u16) << 8) + b2 as u16);
                assert!(value <= MAX_READING);
            }
        }
    }

    #[test]
    fn read_sends_frame_and_decodes() {
        let adc = adc(ScriptedBus::new().reply(&[0x00, 0x02, 0xFF]));

        assert_eq!(adc.read(Channel::new(5).unwrap()).unwrap(), 767);

        let sent = adc.bus().inspect(|b| b.sent().to_vec()).unwrap();
        assert_eq!(sent, vec![vec![0x01, 0xD0, 0x00]]);
    }

    #[test]
    fn transfer_failure_propagates() {
        let adc = adc(ScriptedBus::new().fail("wire unplugged"));

        let err = adc.read(Channel::new(0).unwrap()).unwrap_err();
        assert!(matches!(err, AdcError::TransferFailure(_)));
    }
}
