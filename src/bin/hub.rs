#![no_std]
#![no_main]

use panic_probe as _;
use defmt_rtt as _;

/// Free-running millisecond clock shared between the timer ISR and the
/// idle task, same construction as the node binary.
static CLOCK: fieldlink_core::clock::Clock = fieldlink_core::clock::Clock::new();

#[rtic::app(device = stm32f4xx_hal::pac, peripherals = true)]
mod app {
    use super::CLOCK;
    use stm32f4xx_hal::{
        gpio::{Output, Pin, PushPull},
        i2c::I2c,
        pac,
        prelude::*,
        rcc::Config,
        spi::Spi,
        timer::{CounterHz, Event as TimerEvent},
    };

    use core::fmt::Write as _;

    use display_interface_i2c::I2CInterface;
    use embedded_graphics::{
        mono_font::{ascii::FONT_6X10, MonoTextStyleBuilder},
        pixelcolor::BinaryColor,
        prelude::*,
        text::Text,
    };
    use heapless::String;
    use ssd1306::{mode::BufferedGraphicsMode, prelude::*, Ssd1306};

    use fieldlink_core::board::{Board, GpioLine};
    use fieldlink_core::config::{ConfigRecord, ConfigStore, RamStorage as ConfigRam};
    use fieldlink_core::error_log::{ClockSource, Code, ErrorLog, RamStorage as LogRam};
    use fieldlink_core::main_app::{MainApp, RamExtremaStorage};
    use fieldlink_core::radio::{BoardRfm69, RadioParams, TransceiverFsm};
    use fieldlink_core::time::DateTime;

    const MEMORY_CHECK_INTERVAL_MS: u32 = 1_000;
    /// Estimated free-stack reading for a build without a stack-painting
    /// watermark routine wired up yet; kept comfortably above
    /// [`fieldlink_core::main_app::DEFAULT_STACK_WATERMARK`] so the check
    /// is exercised without constantly tripping.
    const PLACEHOLDER_FREE_STACK_BYTES: u32 = 512;

    pub struct HubBoard {
        spi: Spi<pac::SPI1>,
        radio_cs: Pin<'A', 4, Output<PushPull>>,
        radio_reset: Pin<'B', 0, Output<PushPull>>,
        status_led: Pin<'A', 5, Output<PushPull>>,
    }

    impl Board for HubBoard {
        type Error = stm32f4xx_hal::spi::Error;

        fn spi_transfer(&mut self, byte: u8) -> Result<u8, Self::Error> {
            let mut buf = [byte];
            self.spi.transfer(&mut buf)?;
            Ok(buf[0])
        }

        fn radio_select(&mut self) {
            self.radio_cs.set_low();
        }

        fn radio_release(&mut self) {
            self.radio_cs.set_high();
        }

        fn radio_pull_reset(&mut self) {
            self.radio_reset.set_high();
        }

        fn radio_release_reset(&mut self) {
            self.radio_reset.set_low();
        }

        fn gpio_set(&mut self, line: GpioLine) {
            if line == GpioLine::StatusLed {
                self.status_led.set_high();
            }
        }

        fn gpio_clear(&mut self, line: GpioLine) {
            if line == GpioLine::StatusLed {
                self.status_led.set_low();
            }
        }

        fn sleep_enter(&mut self) {
            // The hub is mains-powered (spec.md §1): it never sleeps.
            // Present only to satisfy the shared Board contract.
        }

        fn millis(&self) -> u32 {
            CLOCK.now()
        }

        fn is_charging(&mut self) -> bool {
            false
        }

        fn charger_connected(&mut self) -> bool {
            false
        }

        fn battery_voltage_mv(&mut self) -> Option<u16> {
            None
        }
    }

    type DisplayI2c = I2c<pac::I2C1>;
    type HubDisplay = Ssd1306<
        I2CInterface<DisplayI2c>,
        DisplaySize128x64,
        BufferedGraphicsMode<DisplaySize128x64>,
    >;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        timer: CounterHz<pac::TIM2>,
        fsm: TransceiverFsm<BoardRfm69<HubBoard>>,
        main_app: MainApp,
        config: ConfigStore<ConfigRam>,
        error_log: ErrorLog<LogRam>,
        extrema_storage: RamExtremaStorage,
        display: HubDisplay,
        last_memory_check_ms: u32,
    }

    /// No RTC driver is wired up on this board revision; see the node
    /// binary's identically named type for the same rationale.
    #[derive(Clone, Copy)]
    pub struct HubClock;
    impl ClockSource for HubClock {
        fn now(&mut self) -> Option<DateTime> {
            None
        }
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        let dp = cx.device;
        let mut rcc = dp.RCC.freeze(Config::hsi().sysclk(84.MHz()));

        let gpioa = dp.GPIOA.split(&mut rcc);
        let gpiob = dp.GPIOB.split(&mut rcc);

        let status_led = gpioa.pa5.into_push_pull_output();
        let radio_cs = gpioa.pa4.into_push_pull_output();
        let radio_reset = gpiob.pb0.into_push_pull_output();

        let sck = gpioa.pa5.into_alternate();
        let miso = gpioa.pa6.into_alternate();
        let mosi = gpioa.pa7.into_alternate();
        let spi = Spi::new(
            dp.SPI1,
            (sck, miso, mosi),
            embedded_hal::spi::MODE_0,
            4.MHz(),
            &mut rcc,
        );

        let board = HubBoard {
            spi,
            radio_cs,
            radio_reset,
            status_led,
        };

        let scl = gpiob.pb8.into_alternate_open_drain();
        let sda = gpiob.pb9.into_alternate_open_drain();
        let i2c = I2c::new(dp.I2C1, (scl, sda), 100.kHz(), &mut rcc);
        let interface = I2CInterface::new(i2c, 0x3C, 0x40);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        let _ = display.init();
        let _ = display.clear(BinaryColor::Off);
        let _ = display.flush();

        let mut error_log = ErrorLog::init(LogRam::new());
        // A failed load keeps the compiled-in default active.
        let mut config = ConfigStore::new(ConfigRam::blank(), ConfigRecord::default_hub());
        if config.load().is_err() {
            error_log.log(&mut HubClock, Code::CorruptConfig, 0);
        }

        let radio = BoardRfm69::new(board);
        let params = RadioParams {
            network_id: config.active().network_id(),
            address: config.active().address(),
            broadcast_address: 0xFF,
            aes_key: *config.active().aes_key(),
            high_power: true,
        };
        let fsm = TransceiverFsm::init(radio, &params);

        let mut timer = dp.TIM2.counter_hz(&mut rcc);
        timer.start(1.kHz()).unwrap();
        timer.listen(TimerEvent::Update);

        let now_ms = CLOCK.now();

        (
            Shared {},
            Local {
                timer,
                fsm,
                main_app: MainApp::new(),
                config,
                error_log,
                extrema_storage: RamExtremaStorage::new(),
                display,
                last_memory_check_ms: now_ms,
            },
            init::Monotonics(),
        )
    }

    #[task(binds = TIM2, local = [timer])]
    fn tick(cx: tick::Context) {
        cx.local.timer.clear_flags(stm32f4xx_hal::timer::Flag::Update);
        CLOCK.tick();
    }

    #[idle(local = [fsm, main_app, config, error_log, extrema_storage, display, last_memory_check_ms])]
    fn idle(cx: idle::Context) -> ! {
        let local = cx.local;

        local.error_log.log(&mut HubClock, Code::PowerOn, 0);
        local.main_app.restore_extrema(local.extrema_storage);

        let report_interval_ms = local.config.active().report_interval_s() * 1000;

        loop {
            let now_ms = CLOCK.now();
            local.fsm.service();
            local.main_app.service(local.fsm, &mut HubClock, now_ms);

            if now_ms.wrapping_sub(*local.last_memory_check_ms) > MEMORY_CHECK_INTERVAL_MS {
                *local.last_memory_check_ms = now_ms;
                local
                    .main_app
                    .check_stack(local.error_log, &mut HubClock, PLACEHOLDER_FREE_STACK_BYTES);
                local.main_app.save_extrema(local.extrema_storage);
                render_node_table(local.display, local.main_app, now_ms, report_interval_ms);
            }
        }
    }

    /// Renders a one-line-per-node summary: connection state, last
    /// reported temperature/humidity tenths, and battery millivolts if
    /// known. Ground truth: `guiNodes.c`'s per-node view, collapsed into
    /// a single screen since the rotary-encoder view stack itself is out
    /// of this crate's core (spec.md: encoder input is hub-binary UI,
    /// not link-layer or application logic).
    fn render_node_table(
        display: &mut HubDisplay,
        main_app: &MainApp,
        now_ms: u32,
        report_interval_ms: u32,
    ) {
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(BinaryColor::On)
            .build();

        let _ = display.clear(BinaryColor::Off);
        for (row, node) in main_app.nodes.iter().enumerate() {
            let mut line: String<32> = String::new();
            if node.is_active(now_ms, report_interval_ms) {
                let _ = core::write!(
                    line,
                    "{:02X} {}.{}C {}.{}%",
                    node.id,
                    node.temperature.value / 10,
                    (node.temperature.value % 10).abs(),
                    node.humidity.value / 10,
                    (node.humidity.value % 10).abs(),
                );
            } else {
                let _ = core::write!(line, "{:02X} --", node.id);
            }
            let y = 8 + row as i32 * 12;
            let _ = Text::new(&line, Point::new(0, y), style).draw(display);
        }
        let _ = display.flush();
    }
}
