//! Battery and backlight helpers at the board boundary

use embedded_hal::pwm::SetDutyCycle;
use tracing::{debug, warn};

use crate::error::InputError;

const BATTERY_EMPTY_MV: i64 = 3300;
/// Calibrated span: full is 4150mV, measured from a 3350mV floor
const BATTERY_SPAN_MV: i64 = 4150 - 3350;

/// Charge estimate in percent from a battery reading behind `divider`
pub fn battery_percent(millivolts: u32, divider: u32) -> u8 {
    let mv = i64::from(millivolts) * i64::from(divider.max(1));
    ((mv - BATTERY_EMPTY_MV) * 100 / BATTERY_SPAN_MV).clamp(0, 100) as u8
}

/// Backlight duty for a brightness percentage
pub fn brightness_duty(percent: u8) -> u8 {
    match percent {
        100 => 250,
        75 => 130,
        50 => 70,
        25 => 20,
        0 => 5,
        other => (u16::from(other.min(100)) * 250 / 100) as u8,
    }
}

pub trait Backlight {
    fn set_duty(&mut self, duty: u8) -> Result<(), InputError>;
}

pub trait BatterySensor {
    fn read_millivolts(&mut self) -> Result<u32, InputError>;
}

/// Any PWM channel used as a backlight, duty scaled over 0..=255
#[derive(Debug)]
pub struct PwmBacklight<P>(pub P);

impl<P: SetDutyCycle> Backlight for PwmBacklight<P> {
    fn set_duty(&mut self, duty: u8) -> Result<(), InputError> {
        self.0
            .set_duty_cycle_fraction(u16::from(duty), u16::from(u8::MAX))
            .map_err(|e| InputError::Pin(format!("{:?}", embedded_hal::pwm::Error::kind(&e))))
    }
}

pub fn set_brightness<B: Backlight + ?Sized>(
    backlight: &mut B,
    percent: u8,
) -> Result<(), InputError> {
    let duty = brightness_duty(percent);
    debug!("Brightness {}% -> duty {}", percent, duty);
    backlight.set_duty(duty)
}

/// Battery charge in percent, 0 when the sensor cannot be read
pub fn read_battery_percent<S: BatterySensor + ?Sized>(sensor: &mut S, divider: u32) -> u8 {
    match sensor.read_millivolts() {
        Ok(mv) => battery_percent(mv, divider),
        Err(e) => {
            warn!("Battery read failed: {}", e);
            0
        }
    }
}
