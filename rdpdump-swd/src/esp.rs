// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ESP32-C3 board support
//!
//! GPIO implementations of [`SwdPins`] and [`TargetControl`] using `esp-hal`.
//!
//! ```rust,ignore
//! use rdpdump_swd::DebugInterface;
//! use rdpdump_swd::esp::{EspSwdPins, EspTargetControl};
//!
//! let peripherals = esp_hal::init(config);
//! let pins = EspSwdPins::new(peripherals.GPIO0, peripherals.GPIO1);
//! let board = EspTargetControl::new(peripherals.GPIO2, peripherals.GPIO3, peripherals.GPIO8);
//! let debug = DebugInterface::from_pins(pins);
//! ```

use esp_hal::delay::Delay;
use esp_hal::gpio::{
    DriveMode, DriveStrength, Flex, InputConfig, InputPin, Level as GpioLevel, Output,
    OutputConfig, OutputPin, Pull,
};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::hal::{Direction, Level, Power, Reset, SwdLine, SwdPins, TargetControl};

/// SWDIO and SWCLK on ESP32-C3 GPIOs.
#[derive(Debug)]
pub struct EspSwdPins<'a> {
    swdio: Flex<'a>,
    swclk: Output<'a>,
}

impl<'a> EspSwdPins<'a> {
    /// Configures the SWD pins.
    ///
    /// SWDIO starts as an input without pull - it is the target's
    /// responsibility to pull SWDIO high.  SWCLK starts as a push-pull
    /// output, low.
    pub fn new(swdio_pin: impl InputPin + OutputPin + 'a, swclk_pin: impl OutputPin + 'a) -> Self {
        let mut swdio = Flex::new(swdio_pin);
        let input_config = InputConfig::default().with_pull(Pull::None);
        swdio.apply_input_config(&input_config);
        swdio.set_input_enable(true);

        let output_config = OutputConfig::default()
            .with_drive_strength(DriveStrength::_20mA)
            .with_drive_mode(DriveMode::PushPull);
        let swclk = Output::new(swclk_pin, GpioLevel::Low, output_config);

        debug!("SWD pins created, SWDIO input without pull, SWCLK output low");

        Self { swdio, swclk }
    }
}

impl SwdPins for EspSwdPins<'_> {
    #[inline]
    fn set_line(&mut self, line: SwdLine, level: Level) {
        match (line, level) {
            (SwdLine::Swclk, Level::High) => self.swclk.set_high(),
            (SwdLine::Swclk, Level::Low) => self.swclk.set_low(),
            (SwdLine::Swdio, Level::High) => self.swdio.set_high(),
            (SwdLine::Swdio, Level::Low) => self.swdio.set_low(),
        }
    }

    #[inline]
    fn set_direction(&mut self, line: SwdLine, direction: Direction) {
        // SWCLK is permanently an output
        if line == SwdLine::Swdio {
            match direction {
                Direction::Output => {
                    self.swdio.set_input_enable(false);
                    self.swdio.set_output_enable(true);
                }
                Direction::Input => {
                    self.swdio.set_output_enable(false);
                    self.swdio.set_input_enable(true);
                }
            }
        }
    }

    #[inline]
    fn read_line(&mut self, line: SwdLine) -> Level {
        match line {
            SwdLine::Swdio => Level::from(self.swdio.is_high()),
            SwdLine::Swclk => Level::from(self.swclk.is_set_high()),
        }
    }

    #[inline]
    fn delay_cycles(&mut self, cycles: u32) {
        riscv::asm::delay(cycles);
    }
}

/// Target power switch, reset line and status LED on ESP32-C3 GPIOs.
///
/// Power and LED are active high.  Reset is active low, driving the target's
/// NRST.
#[derive(Debug)]
pub struct EspTargetControl<'a> {
    power: Output<'a>,
    reset: Output<'a>,
    led: Output<'a>,
}

impl<'a> EspTargetControl<'a> {
    /// Configures the control pins, leaving the target unpowered and held in
    /// reset.
    pub fn new(
        power_pin: impl OutputPin + 'a,
        reset_pin: impl OutputPin + 'a,
        led_pin: impl OutputPin + 'a,
    ) -> Self {
        let config = OutputConfig::default();
        Self {
            power: Output::new(power_pin, GpioLevel::Low, config),
            reset: Output::new(reset_pin, GpioLevel::Low, config),
            led: Output::new(led_pin, GpioLevel::Low, config),
        }
    }
}

impl TargetControl for EspTargetControl<'_> {
    fn set_power(&mut self, power: Power) {
        match power {
            Power::On => self.power.set_high(),
            Power::Off => self.power.set_low(),
        }
    }

    fn set_reset(&mut self, reset: Reset) {
        match reset {
            Reset::Asserted => self.reset.set_low(),
            Reset::Released => self.reset.set_high(),
        }
    }

    fn set_indicator(&mut self, on: bool) {
        self.led.set_level(GpioLevel::from(on));
    }

    fn delay_ms(&mut self, ms: u32) {
        Delay::new().delay_millis(ms);
    }
}
