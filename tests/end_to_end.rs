use rppal::spi::Mode;
use std::thread;

use mic_level::mock::{ScriptedBus, SimulatedBus, SimulatedEnumerator};
use mic_level::{AdcError, Channel, Mcp3008, SampleRequest, SampleWindow, Sampler, SamplerWorker};

#[test]
fn connect_then_read_simulated_device() {
    let enumerator =
        SimulatedEnumerator::new(ScriptedBus::new().reply(&[0x00, 0x02, 0xFF])).with_device(0, 0);

    let adc = Mcp3008::connect_with(&enumerator, "bus 0").unwrap();
    assert_eq!(adc.read(Channel::new(0).unwrap()).unwrap(), 767);

    let opened = enumerator.opened();
    assert_eq!(opened.len(), 1);
    let (device, settings) = &opened[0];
    assert_eq!((device.bus, device.chip_select), (0, 0));
    assert_eq!(settings.clock_speed, 3_600_000);
    assert_eq!(settings.mode, Mode::Mode0);
    assert_eq!(settings.bits_per_word, 8);
}

#[test]
fn connect_without_devices_fails() {
    let enumerator = SimulatedEnumerator::new(ScriptedBus::new()).with_device(1, 0);

    let result = Mcp3008::connect_with(&enumerator, "SPI0");
    assert!(matches!(result, Err(AdcError::NoDeviceFound(d)) if d == "SPI0"));
    assert!(enumerator.opened().is_empty());
}

#[test]
fn connect_picks_lowest_chip_select() {
    let enumerator = SimulatedEnumerator::new(ScriptedBus::new())
        .with_device(0, 1)
        .with_device(0, 0);

    Mcp3008::connect_with(&enumerator, "spi0").unwrap();

    let opened = enumerator.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].0.chip_select, 0);
}

#[test]
fn connect_rejects_bad_descriptor() {
    let enumerator = SimulatedEnumerator::new(ScriptedBus::new()).with_device(0, 0);
    assert!(matches!(
        Mcp3008::connect_with(&enumerator, "uart0"),
        Err(AdcError::InvalidDescriptor(_))
    ));
}

#[test]
fn simulated_microphone_level_is_bounded() {
    let enumerator = SimulatedEnumerator::new(SimulatedBus::with_seed(3, 42)).with_device(0, 0);
    let adc = Mcp3008::connect_with(&enumerator, "spi0").unwrap();
    let sampler = Sampler::new(adc);

    for scale_max in [0, 10, 100, 1000] {
        let level = sampler.sample(10, Channel::new(3).unwrap(), scale_max).unwrap();
        assert!((0..=scale_max).contains(&level), "level {} of {}", level, scale_max);
    }
}

#[test]
fn reader_and_worker_share_one_bus() {
    let enumerator = SimulatedEnumerator::new(SimulatedBus::with_seed(0, 1)).with_device(0, 0);
    let adc = Mcp3008::connect_with(&enumerator, "spi0").unwrap();
    let reader = adc.clone();

    let worker = SamplerWorker::spawn(Sampler::new(adc)).unwrap();
    let pending = worker
        .submit(SampleRequest {
            channel: Channel::new(0).unwrap(),
            window: SampleWindow::new(30, 100).unwrap(),
        })
        .unwrap();

    let other = thread::spawn(move || {
        let channel = Channel::new(5).unwrap();
        (0..100)
            .map(|_| reader.read(channel))
            .collect::<Result<Vec<u16>, _>>()
    });

    let level = pending.recv().unwrap().unwrap();
    assert!((0..=100).contains(&level));
    let quiet = other.join().unwrap().unwrap();
    assert!(quiet.iter().all(|&v| v <= 6));
}
