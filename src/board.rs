//! Thin capability set the core is written against, so device-specific
//! register and pin bindings live outside it.
//!
//! Ground truth: Design Notes §9 ("thin board capability set") and
//! `firmware/src/node/RFM69_HAL.h`, which wraps the same handful of
//! operations — chip-select, reset pin, a blocking byte transfer, and
//! sleep entry — behind AVR port-manipulation macros. This trait is that
//! same seam, generalized so a binary built on any `embedded-hal`-style
//! peripheral set can implement it.

/// Everything the radio link layer and the event loop need from the host
/// MCU. Implemented once per binary (`fieldlink-node`, `fieldlink-hub`)
/// against real peripherals; host tests use a fake.
pub trait Board {
    /// Errors surfaced from the underlying peripheral drivers.
    type Error;

    /// Full-duplex transfer of one byte over the SPI bus shared with the
    /// transceiver. The mainline is the only SPI user (spec.md §5);
    /// callers are responsible for bracketing this with
    /// [`Board::radio_select`]/[`Board::radio_release`].
    fn spi_transfer(&mut self, byte: u8) -> Result<u8, Self::Error>;

    /// Pull the transceiver's chip-select line low.
    fn radio_select(&mut self);

    /// Release the transceiver's chip-select line.
    fn radio_release(&mut self);

    /// Drive the transceiver's reset line active.
    fn radio_pull_reset(&mut self);

    /// Release the transceiver's reset line.
    fn radio_release_reset(&mut self);

    /// Set a named GPIO output high. Used for indicator LEDs and similar
    /// board-specific signaling outside the core's concern.
    fn gpio_set(&mut self, line: GpioLine);

    /// Set a named GPIO output low.
    fn gpio_clear(&mut self, line: GpioLine);

    /// Enter the MCU's deep-sleep mode. Returns once the wake source (RTC
    /// alarm or external interrupt) fires.
    fn sleep_enter(&mut self);

    /// Current value of the free-running millisecond counter.
    fn millis(&self) -> u32;

    /// True while the battery is actively being charged
    /// (`libPower_IsCharging`).
    fn is_charging(&mut self) -> bool;

    /// True while a charger is physically plugged in, independent of
    /// whether it is presently topping off the battery
    /// (`libPower_IsChargerConnected`).
    fn charger_connected(&mut self) -> bool;

    /// Battery voltage in millivolts, or `None` if the ADC sample isn't
    /// ready yet (`libPower_IsBatteryVoltageValid`/`libPower_GetBatteryVoltage`).
    fn battery_voltage_mv(&mut self) -> Option<u16>;
}

/// Closed set of board GPIO lines the core drives directly, independent
/// of the concrete pin each binary wires it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum GpioLine {
    StatusLed,
    ChargerDetect,
}
