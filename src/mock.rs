use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use crate::adc::MAX_READING;
use crate::bus::{BusChannel, SpiSettings};
use crate::device::{BusSelector, DeviceEnumerator, DeviceInfo};
use crate::error::{AdcError, Result};

#[derive(Debug, Clone)]
enum Reply {
    Bytes(Vec<u8>),
    Fail(String),
}

/// Replays canned responses in order and records every outbound frame.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBus {
    replies: VecDeque<Reply>,
    sent: Vec<Vec<u8>>,
    cycle: bool,
}

impl ScriptedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, bytes: &[u8]) -> Self {
        self.replies.push_back(Reply::Bytes(bytes.to_vec()));
        self
    }

    /// Queues the response an MCP3008 gives for `value`.
    pub fn reading(self, value: u16) -> Self {
        self.reply(&encode_reading(value))
    }

    pub fn fail(mut self, message: &str) -> Self {
        self.replies.push_back(Reply::Fail(message.to_string()));
        self
    }

    /// Start over from the first reply once the script runs out.
    pub fn cycle(mut self) -> Self {
        self.cycle = true;
        self
    }

    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }
}

impl BusChannel for ScriptedBus {
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<()> {
        self.sent.push(write.to_vec());

        let reply = self
            .replies
            .pop_front()
            .ok_or_else(|| AdcError::TransferFailure("script exhausted".to_string()))?;
        if self.cycle {
            self.replies.push_back(reply.clone());
        }

        match reply {
            Reply::Bytes(bytes) if bytes.len() == read.len() => {
                read.copy_from_slice(&bytes);
                Ok(())
            }
            Reply::Bytes(bytes) => Err(AdcError::TransferFailure(format!(
                "expected {} bytes, script has {}",
                read.len(),
                bytes.len()
            ))),
            Reply::Fail(message) => Err(AdcError::TransferFailure(message)),
        }
    }
}

fn encode_reading(value: u16) -> [u8; 3] {
    let value = value.min(MAX_READING);
    [0x00, (value >> 8) as u8, (value & 0xFF) as u8]
}

/// Answers MCP3008 frames with a synthetic microphone signal.
///
/// The selected channel carries a tone around mid-scale whose amplitude
/// swells and fades every few seconds; other channels read near zero.
#[derive(Debug, Clone)]
pub struct SimulatedBus {
    mic_channel: u8,
    started: Instant,
    rng: StdRng,
}

const TONE_HZ: f64 = 440.0;
const SWELL_HZ: f64 = 0.25;
const NOISE: i32 = 6;

impl SimulatedBus {
    pub fn new(mic_channel: u8) -> Self {
        Self::with_rng(mic_channel, StdRng::from_entropy())
    }

    pub fn with_seed(mic_channel: u8, seed: u64) -> Self {
        Self::with_rng(mic_channel, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mic_channel: u8, rng: StdRng) -> Self {
        SimulatedBus {
            mic_channel,
            started: Instant::now(),
            rng,
        }
    }

    fn level(&mut self, channel: u8) -> u16 {
        let noise = self.rng.gen_range(-NOISE..=NOISE);
        if channel != self.mic_channel {
            return noise.max(0) as u16;
        }

        let t = self.started.elapsed().as_secs_f64();
        let amplitude = 480.0 * (0.5 - 0.5 * (TAU * SWELL_HZ * t).cos());
        let signal = 512.0 + amplitude * (TAU * TONE_HZ * t).sin();
        (signal as i32 + noise).clamp(0, MAX_READING as i32) as u16
    }
}

impl BusChannel for SimulatedBus {
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<()> {
        if write.len() != 3 || read.len() != 3 || write[0] != 0x01 {
            return Err(AdcError::TransferFailure(format!(
                "unexpected frame {:02x?}",
                write
            )));
        }
        let channel = (write[1] >> 4) & 0x07;
        read.copy_from_slice(&encode_reading(self.level(channel)));
        Ok(())
    }
}

/// Offers a fixed list of devices, each opened as a clone of one bus.
pub struct SimulatedEnumerator<B> {
    devices: Vec<DeviceInfo>,
    bus: B,
    opened: Mutex<Vec<(DeviceInfo, SpiSettings)>>,
}

impl<B: BusChannel + Clone> SimulatedEnumerator<B> {
    pub fn new(bus: B) -> Self {
        SimulatedEnumerator {
            devices: Vec::new(),
            bus,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_device(mut self, bus: u8, chip_select: u8) -> Self {
        self.devices.push(DeviceInfo {
            bus,
            chip_select,
            path: PathBuf::from(format!("/dev/spidev{}.{}", bus, chip_select)),
        });
        self
    }

    /// Devices opened so far, with the settings they were opened with.
    pub fn opened(&self) -> Vec<(DeviceInfo, SpiSettings)> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }
}

impl<B: BusChannel + Clone> DeviceEnumerator for SimulatedEnumerator<B> {
    type Device = B;

    fn find_all(&self, selector: &BusSelector) -> Result<Vec<DeviceInfo>> {
        let mut devices: Vec<DeviceInfo> = self
            .devices
            .iter()
            .filter(|d| d.bus == selector.bus)
            .cloned()
            .collect();
        devices.sort_by_key(|d| d.chip_select);
        Ok(devices)
    }

    fn open(&self, device: &DeviceInfo, settings: &SpiSettings) -> Result<B> {
        debug!("Simulated open of {}", device.path.display());
        if let Ok(mut opened) = self.opened.lock() {
            opened.push((device.clone(), *settings));
        }
        Ok(self.bus.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::decode_reading;

    #[test]
    fn scripted_replays_then_runs_out() {
        let mut bus = ScriptedBus::new().reading(767);
        let mut rx = [0u8; 3];

        bus.transfer(&mut rx, &[1, 0x80, 0]).unwrap();
        assert_eq!(rx, [0x00, 0x02, 0xFF]);
        assert!(bus.transfer(&mut rx, &[1, 0x80, 0]).is_err());
        assert_eq!(bus.sent().len(), 2);
    }

    #[test]
    fn scripted_length_mismatch_fails() {
        let mut bus = ScriptedBus::new().reply(&[0, 1]);
        let mut rx = [0u8; 3];
        assert!(bus.transfer(&mut rx, &[1, 0x80, 0]).is_err());
    }

    #[test]
    fn simulated_stays_in_range() {
        let mut bus = SimulatedBus::with_seed(0, 7);
        let mut rx = [0u8; 3];
        for channel in 0..8u8 {
            bus.transfer(&mut rx, &[0x01, (0x08 | channel) << 4, 0x00])
                .unwrap();
            assert!(decode_reading(&rx) <= MAX_READING);
        }
    }

    #[test]
    fn simulated_rejects_bad_start_bit() {
        let mut bus = SimulatedBus::with_seed(0, 7);
        let mut rx = [0u8; 3];
        assert!(bus.transfer(&mut rx, &[0x00, 0x80, 0x00]).is_err());
    }
}
