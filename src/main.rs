use boardinput::config::{BoardKind, InputSettings};
use boardinput::error::InputError;
use boardinput::input::{Board, InputCore, MonotonicClock, Ready, TouchPoint};
use boardinput::peripherals::{read_battery_percent, Backlight, BatterySensor};
use boardinput::power::PowerSaveTimer;
use boardinput::sources::{
    spawn_sampler, ActiveLow, ButtonBinding, ButtonSource, ClickButton, ClickTiming, Cst816,
    GpioMatrixScanner, MatrixSource, NavLatch, PollContext, RawInputSource,
    ScannedKeyboardSource, SelectLineSource, Tca8418, TouchSource,
};
use chrono::Local;
use std::path::PathBuf;
use color_eyre::{eyre::WrapErr, Result};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::i2c::I2c;
use rppal::pwm::{Channel, Polarity, Pwm};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// BCM pin numbers of the board lines on the Raspberry Pi header
const SELECT_BUTTON_PIN: u8 = 17;
const BUTTON1_PIN: u8 = 23;
const BUTTON2_PIN: u8 = 24;
const SCAN_ADDRESS_PINS: [u8; 3] = [5, 6, 13];
const SCAN_INPUT_PINS: [u8; 7] = [12, 16, 20, 21, 26, 19, 25];

const BACKLIGHT_PWM_HZ: f64 = 1_000.0;
const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";
const DEFAULT_BRIGHTNESS: u8 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = InputSettings::load_or_default(&InputSettings::config_path()).await;
    let rotation = settings
        .initial_rotation()
        .wrap_err("Invalid rotation in input settings")?;
    info!("Starting input demo for {:?}", settings.board);

    let clock = MonotonicClock::new();
    let cancel = CancellationToken::new();

    let (board, sampler) = discover_board(&settings, &cancel, clock)?;
    let power = PowerSaveTimer::new(
        open_backlight(),
        settings.idle_timeout_ms,
        DEFAULT_BRIGHTNESS,
        clock.now_ms(),
    );
    let mut core = board
        .into_core(power)
        .wrap_err("Failed to build input core")?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown requested");
        shutdown.cancel();
    });

    let battery = SysfsBattery::discover();
    if battery.is_none() {
        info!("No battery voltage reported by the system, battery stats disabled");
    }

    let ctx = PollContext {
        now_ms: clock.now_ms(),
        rotation,
        long_press: false,
        gate_open: true,
    };
    run_poll_loop(&mut core, battery, ctx, &settings, clock, cancel).await;

    if let Some(handle) = sampler {
        handle.await.wrap_err("Button sampler panicked")?;
    }
    info!("Input demo stopped");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn discover_board(
    settings: &InputSettings,
    cancel: &CancellationToken,
    clock: MonotonicClock,
) -> Result<(Board<Ready>, Option<JoinHandle<()>>)> {
    let mut board = Board::create(settings.clone()).with_touch_sink(Box::new(
        |point: TouchPoint| debug!("Touch sample ({}, {})", point.x, point.y),
    ));
    let mut sampler = None;

    match settings.board {
        BoardKind::CardputerAdv => {
            board = board
                .offer("tca8418", probe_tca8418)
                .offer("gpio-scan", probe_scanned);
        }
        BoardKind::Cardputer => {
            board = board.offer("gpio-scan", probe_scanned);
        }
        BoardKind::TouchDisplay => {
            board = board.offer("cst816", probe_cst816);
            let latch = NavLatch::new();
            match open_click_buttons(settings) {
                Ok(buttons) => {
                    sampler = Some(spawn_sampler(
                        buttons,
                        latch.clone(),
                        settings.button_sample_ms,
                        cancel.clone(),
                        clock,
                    ));
                    board = board.with_dedicated(Box::new(ButtonSource::new(latch)));
                }
                Err(e) => warn!("Click buttons unavailable: {}", e),
            }
        }
    }

    if settings.board != BoardKind::TouchDisplay {
        match open_input(SELECT_BUTTON_PIN) {
            Ok(pin) => {
                board = board.with_dedicated(Box::new(SelectLineSource::new(ActiveLow(pin))));
            }
            Err(e) => warn!("Select button unavailable: {}", e),
        }
    }

    let board = board
        .finish()
        .wrap_err("No usable input source on this board")?;
    info!("Board ready with {}", board.source_name());
    Ok((board, sampler))
}

fn probe_tca8418(settings: &InputSettings) -> Result<Box<dyn RawInputSource>, InputError> {
    let i2c = open_i2c()?;
    let keypad = Tca8418::probe(i2c, settings.tca8418_address, settings.scan_encoding)?;
    Ok(Box::new(MatrixSource::new(
        keypad,
        settings.scan_encoding,
        settings.matrix_poll_ms,
    )))
}

fn probe_cst816(settings: &InputSettings) -> Result<Box<dyn RawInputSource>, InputError> {
    let i2c = open_i2c()?;
    let panel = Cst816::probe(i2c, settings.cst816_address, settings.home_button)?;
    Ok(Box::new(TouchSource::new(panel, settings.home_rate_limit_ms)))
}

fn probe_scanned(_settings: &InputSettings) -> Result<Box<dyn RawInputSource>, InputError> {
    let gpio = Gpio::new().map_err(gpio_error)?;
    let address = collect_pins(SCAN_ADDRESS_PINS.map(|pin| open_output(&gpio, pin)))?;
    let inputs = collect_pins(SCAN_INPUT_PINS.map(|pin| open_pullup(&gpio, pin)))?;
    Ok(Box::new(ScannedKeyboardSource::new(GpioMatrixScanner::new(
        address, inputs,
    ))))
}

fn open_click_buttons(settings: &InputSettings) -> Result<Vec<ClickButton<ActiveLow<InputPin>>>> {
    let timing = ClickTiming {
        short_press_ms: settings.short_press_ms,
        long_press_ms: settings.long_press_ms,
    };
    Ok(vec![
        ClickButton::new(
            ActiveLow(open_input(BUTTON1_PIN)?),
            timing,
            ButtonBinding::NEXT_SELECT,
        ),
        ClickButton::new(
            ActiveLow(open_input(BUTTON2_PIN)?),
            timing,
            ButtonBinding::PREVIOUS_ESCAPE,
        ),
    ])
}

fn open_i2c() -> Result<I2c, InputError> {
    I2c::new().map_err(|e| InputError::ControllerAbsent(format!("I2C bus unavailable: {}", e)))
}

fn open_input(pin: u8) -> Result<InputPin, InputError> {
    let gpio = Gpio::new().map_err(gpio_error)?;
    open_pullup(&gpio, pin)
}

fn open_pullup(gpio: &Gpio, pin: u8) -> Result<InputPin, InputError> {
    Ok(gpio.get(pin).map_err(gpio_error)?.into_input_pullup())
}

fn open_output(gpio: &Gpio, pin: u8) -> Result<OutputPin, InputError> {
    Ok(gpio.get(pin).map_err(gpio_error)?.into_output())
}

fn collect_pins<T, const N: usize>(pins: [Result<T, InputError>; N]) -> Result<[T; N], InputError> {
    let opened = pins.into_iter().collect::<Result<Vec<T>, InputError>>()?;
    opened
        .try_into()
        .map_err(|_| InputError::Pin(format!("expected {} pins", N)))
}

fn gpio_error(e: rppal::gpio::Error) -> InputError {
    InputError::Pin(e.to_string())
}

enum DemoBacklight {
    Pwm(Pwm),
    Absent,
}

impl Backlight for DemoBacklight {
    fn set_duty(&mut self, duty: u8) -> Result<(), InputError> {
        match self {
            DemoBacklight::Pwm(pwm) => pwm
                .set_duty_cycle(f64::from(duty) / f64::from(u8::MAX))
                .map_err(|e| InputError::Pin(e.to_string())),
            DemoBacklight::Absent => {
                debug!("Backlight duty {} (no PWM channel)", duty);
                Ok(())
            }
        }
    }
}

fn open_backlight() -> DemoBacklight {
    match Pwm::with_frequency(Channel::Pwm0, BACKLIGHT_PWM_HZ, 0.0, Polarity::Normal, true) {
        Ok(pwm) => DemoBacklight::Pwm(pwm),
        Err(e) => {
            warn!("No PWM backlight available: {}", e);
            DemoBacklight::Absent
        }
    }
}

/// Battery voltage from the first power supply that exposes `voltage_now`
struct SysfsBattery(PathBuf);

impl SysfsBattery {
    fn discover() -> Option<Self> {
        std::fs::read_dir(POWER_SUPPLY_DIR)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path().join("voltage_now"))
            .find(|path| path.exists())
            .map(SysfsBattery)
    }
}

impl BatterySensor for SysfsBattery {
    fn read_millivolts(&mut self) -> Result<u32, InputError> {
        let content = std::fs::read_to_string(&self.0)
            .map_err(|e| InputError::Sensor(format!("{}: {}", self.0.display(), e)))?;
        let microvolts: u32 = content
            .trim()
            .parse()
            .map_err(|e| InputError::Sensor(format!("{}: {}", self.0.display(), e)))?;
        Ok(microvolts / 1000)
    }
}

async fn run_poll_loop<B: Backlight>(
    core: &mut InputCore<PowerSaveTimer<B>>,
    mut battery: Option<SysfsBattery>,
    mut ctx: PollContext,
    settings: &InputSettings,
    clock: MonotonicClock,
    cancel: CancellationToken,
) {
    info!(
        "Polling {} every {}ms",
        core.source_name(),
        settings.poll_interval_ms
    );
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_millis(settings.poll_interval_ms.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut cycles: u64 = 0;
    let mut processed: u64 = 0;
    let mut key_events: u64 = 0;
    let mut last_log_time = Local::now();
    let log_interval = chrono::Duration::seconds(30);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        ctx.now_ms = clock.now_ms();
        let frame = core.poll_input(&ctx);
        core.power_mut().tick(ctx.now_ms);

        cycles += 1;
        if frame.processed {
            processed += 1;
        }
        key_events += frame.keys.len() as u64;

        let nav = core.publisher_mut().take_nav();
        if !nav.is_empty() {
            info!("Navigation: {:?}", nav);
        }
        if frame.processed && !frame.keys.is_empty() {
            let stroke = core.publisher().key_stroke();
            info!(
                "Keystroke '{}' modifiers={:?} flags={:?}",
                stroke, stroke.modifiers, stroke.flags
            );
            if stroke.flags.exit_requested {
                info!("Exit gesture received");
            }
        }
        if let Some(point) = core.publisher_mut().take_touch() {
            info!("Touch at ({}, {})", point.x, point.y);
        }

        let now = Local::now();
        if now - last_log_time > log_interval {
            info!(
                "Input stats: {} cycles, {} processed, {} key events in last {} seconds at {}",
                cycles,
                processed,
                key_events,
                log_interval.num_seconds(),
                now.format("%H:%M:%S")
            );
            if let Some(sensor) = battery.as_mut() {
                info!(
                    "Battery at {}%",
                    read_battery_percent(sensor, settings.battery_divider)
                );
            }
            cycles = 0;
            processed = 0;
            key_events = 0;
            last_log_time = now;
        }
    }
}
