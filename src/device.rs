use log::{debug, warn};
use rppal::spi::{Bus, SlaveSelect, Spi};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bus::{BusChannel, SpiSettings};
use crate::error::{AdcError, Result};

/// Which bus a descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusSelector {
    pub bus: u8,
}

impl BusSelector {
    /// Accepts `spi0`, `SPI0`, `bus 0` or a bare `0`.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let lowered = descriptor.trim().to_ascii_lowercase();
        let number = lowered
            .strip_prefix("spi")
            .or_else(|| lowered.strip_prefix("bus"))
            .unwrap_or(lowered.as_str())
            .trim();

        number
            .parse::<u8>()
            .map(|bus| BusSelector { bus })
            .map_err(|_| AdcError::InvalidDescriptor(descriptor.to_string()))
    }
}

/// One enumerated device on a bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub bus: u8,
    pub chip_select: u8,
    pub path: PathBuf,
}

pub trait DeviceEnumerator {
    type Device: BusChannel;

    /// Every device on the selected bus, lowest chip select first.
    fn find_all(&self, selector: &BusSelector) -> Result<Vec<DeviceInfo>>;

    fn open(&self, device: &DeviceInfo, settings: &SpiSettings) -> Result<Self::Device>;
}

/// Resolves `descriptor` and opens the first match.
///
/// Several matches are not disambiguated: the lowest chip select wins.
pub fn open_first<E: DeviceEnumerator>(
    enumerator: &E,
    descriptor: &str,
    settings: &SpiSettings,
) -> Result<E::Device> {
    let selector = BusSelector::parse(descriptor)?;
    let devices = enumerator.find_all(&selector)?;

    let device = devices
        .first()
        .ok_or_else(|| AdcError::NoDeviceFound(descriptor.to_string()))?;
    if devices.len() > 1 {
        warn!(
            "{} devices match '{}', using {}",
            devices.len(),
            descriptor,
            device.path.display()
        );
    }

    debug!("Opening {} with {:?}", device.path.display(), settings);
    enumerator.open(device, settings)
}

/// Enumerates Linux `spidev<bus>.<cs>` nodes.
///
/// `dir` only controls where nodes are listed from. rppal always opens
/// `/dev/spidev<bus>.<cs>`, so a node found elsewhere is opened from `/dev`.
#[derive(Debug, Clone)]
pub struct SpidevEnumerator {
    dir: PathBuf,
}

impl Default for SpidevEnumerator {
    fn default() -> Self {
        Self::new("/dev")
    }
}

impl SpidevEnumerator {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

/// Splits `spidev0.1` into `(0, 1)`.
fn parse_spidev_name(name: &str) -> Option<(u8, u8)> {
    let (bus, cs) = name.strip_prefix("spidev")?.split_once('.')?;
    Some((bus.parse().ok()?, cs.parse().ok()?))
}

fn spi_bus(index: u8) -> Option<Bus> {
    Some(match index {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        3 => Bus::Spi3,
        4 => Bus::Spi4,
        5 => Bus::Spi5,
        6 => Bus::Spi6,
        _ => return None,
    })
}

fn slave_select(index: u8) -> Option<SlaveSelect> {
    Some(match index {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        3 => SlaveSelect::Ss3,
        4 => SlaveSelect::Ss4,
        5 => SlaveSelect::Ss5,
        6 => SlaveSelect::Ss6,
        7 => SlaveSelect::Ss7,
        8 => SlaveSelect::Ss8,
        9 => SlaveSelect::Ss9,
        10 => SlaveSelect::Ss10,
        11 => SlaveSelect::Ss11,
        12 => SlaveSelect::Ss12,
        13 => SlaveSelect::Ss13,
        14 => SlaveSelect::Ss14,
        15 => SlaveSelect::Ss15,
        _ => return None,
    })
}

impl DeviceEnumerator for SpidevEnumerator {
    type Device = Spi;

    fn find_all(&self, selector: &BusSelector) -> Result<Vec<DeviceInfo>> {
        let mut devices = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some((bus, chip_select)) = name.to_str().and_then(parse_spidev_name) else {
                continue;
            };
            if bus == selector.bus {
                devices.push(DeviceInfo {
                    bus,
                    chip_select,
                    path: entry.path(),
                });
            }
        }
        devices.sort_by_key(|d| d.chip_select);
        Ok(devices)
    }

    fn open(&self, device: &DeviceInfo, settings: &SpiSettings) -> Result<Spi> {
        let bus = spi_bus(device.bus)
            .ok_or_else(|| AdcError::Configuration(format!("unsupported bus {}", device.bus)))?;
        let slave_select = slave_select(device.chip_select).ok_or_else(|| {
            AdcError::Configuration(format!("unsupported chip select {}", device.chip_select))
        })?;

        let spi = Spi::new(bus, slave_select, settings.clock_speed, settings.mode)
            .map_err(|e| AdcError::Configuration(e.to_string()))?;
        spi.set_bits_per_word(settings.bits_per_word)
            .map_err(|e| AdcError::Configuration(e.to_string()))?;
        Ok(spi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn descriptor_forms() {
        assert_eq!(BusSelector::parse("spi0").unwrap().bus, 0);
        assert_eq!(BusSelector::parse("SPI1").unwrap().bus, 1);
        assert_eq!(BusSelector::parse("bus 0").unwrap().bus, 0);
        assert_eq!(BusSelector::parse(" 2 ").unwrap().bus, 2);
        assert!(matches!(
            BusSelector::parse("i2c1"),
            Err(AdcError::InvalidDescriptor(_))
        ));
        assert!(BusSelector::parse("spi").is_err());
    }

    #[test]
    fn spidev_names() {
        assert_eq!(parse_spidev_name("spidev0.1"), Some((0, 1)));
        assert_eq!(parse_spidev_name("spidev10.0"), Some((10, 0)));
        assert_eq!(parse_spidev_name("spidev0"), None);
        assert_eq!(parse_spidev_name("ttyS0"), None);
    }

    #[test]
    fn every_chip_select_maps() {
        for index in 0..16 {
            assert!(slave_select(index).is_some(), "chip select {}", index);
        }
        assert!(matches!(slave_select(3), Some(SlaveSelect::Ss3)));
        assert!(matches!(slave_select(15), Some(SlaveSelect::Ss15)));
        assert!(slave_select(16).is_none());

        assert!(matches!(spi_bus(6), Some(Bus::Spi6)));
        assert!(spi_bus(7).is_none());
    }

    #[test]
    fn high_bus_rejected_before_opening() {
        let device = DeviceInfo {
            bus: 9,
            chip_select: 0,
            path: PathBuf::from("/dev/spidev9.0"),
        };
        let result = SpidevEnumerator::default().open(&device, &crate::adc::MCP3008_SETTINGS);
        assert!(matches!(result, Err(AdcError::Configuration(_))));
    }

    #[test]
    fn spidev_scan_filters_and_sorts() {
        let dir = std::env::temp_dir().join(format!("mic-level-spidev-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["spidev0.3", "spidev0.1", "spidev0.0", "spidev1.0", "null"] {
            File::create(dir.join(name)).unwrap();
        }

        let found = SpidevEnumerator::new(&dir)
            .find_all(&BusSelector { bus: 0 })
            .unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let selects: Vec<u8> = found.iter().map(|d| d.chip_select).collect();
        assert_eq!(selects, vec![0, 1, 3]);
        assert!(found.iter().all(|d| d.bus == 0));
    }
}
