//! Windowed peak-to-peak loudness measurement.

use log::debug;
use std::time::{Duration, Instant};

use crate::adc::{Channel, Mcp3008};
use crate::bus::BusChannel;
use crate::error::{AdcError, Result};
use crate::scale::rescale;

/// Upper bound of the source range handed to `rescale`: one past the largest reading.
pub const FULL_SCALE: i32 = 1024;

/// How long to listen and what range to report in (`0..=scale_max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    pub window_ms: u32,
    pub scale_max: i32,
}

impl SampleWindow {
    pub fn new(window_ms: u32, scale_max: i32) -> Result<Self> {
        if scale_max < 0 {
            return Err(AdcError::InvalidScale(scale_max));
        }
        Ok(SampleWindow {
            window_ms,
            scale_max,
        })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.window_ms.into())
    }
}

/// Running bounds over one window. Empty until the first reading.
#[derive(Debug, Default)]
struct PeakTracker {
    bounds: Option<(u16, u16)>,
    samples: u32,
}

impl PeakTracker {
    fn record(&mut self, value: u16) {
        self.samples = self.samples.saturating_add(1);
        self.bounds = Some(match self.bounds {
            None => (value, value),
            Some((min, max)) if value > max => (min, value),
            Some((min, max)) if value < min => (value, max),
            Some(bounds) => bounds,
        });
    }

    fn peak_to_peak(&self) -> u16 {
        self.bounds.map_or(0, |(min, max)| max - min)
    }
}

pub struct Sampler<B> {
    adc: Mcp3008<B>,
}

impl<B: BusChannel> Sampler<B> {
    pub fn new(adc: Mcp3008<B>) -> Self {
        Sampler { adc }
    }

    pub fn adc(&self) -> &Mcp3008<B> {
        &self.adc
    }

    /// Listens on `channel` for `window_ms` and returns the loudness in
    /// `0..=scale_max`, rounded up.
    ///
    /// Spins on the bus for the whole window, so call it from a thread that
    /// can afford to block. A window that completes no read reports 0.
    pub fn sample(&self, window_ms: u32, channel: Channel, scale_max: i32) -> Result<i32> {
        self.sample_window(channel, SampleWindow::new(window_ms, scale_max)?)
    }

    pub fn sample_window(&self, channel: Channel, window: SampleWindow) -> Result<i32> {
        let peak_to_peak = self.peak_to_peak(channel, window.duration())?;
        rescale(peak_to_peak.into(), 0, FULL_SCALE, 0, window.scale_max)
    }

    /// Raw max - min over the window, in `0..=1023`.
    pub fn peak_to_peak(&self, channel: Channel, window: Duration) -> Result<u16> {
        let started = Instant::now();
        let mut tracker = PeakTracker::default();

        while started.elapsed() < window {
            tracker.record(self.adc.read(channel)?);
        }

        debug!(
            "{}: {} samples in {:?}, bounds {:?}",
            channel, tracker.samples, window, tracker.bounds
        );
        Ok(tracker.peak_to_peak())
    }
}
