/*!
    conversions between physical units and the raw codes carried by frames
*/

/// clock feeding the PWM counters of the board
pub const PWM_CLOCK: f64 = 32_000_000.;
/// full scale of analog outputs, in volts
pub const ANALOG_OUTPUT_RANGE: f64 = 10.;
/// full scale code of the 12 bit analog converters
pub const ANALOG_CODE_MAX: u16 = 4095;
/// scale of analog inputs in voltage mode, the code full scale is 10V
pub const VOLTAGE_SCALE: f64 = 10.;
/**
    scale of analog inputs in current mode

    The board measures the current on a shunt, and the same 0..4095 code is reported. Reading it with 50.0 in place of the 10V full scale gives milliamps, so the 0..20mA range covers only part of the code range.
*/
pub const CURRENT_SCALE: f64 = 50.;

/// measurement mode of an analog input
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AnalogMode {
    /// 0..10V, reported in volts
    #[default]
    Voltage,
    /// 0..20mA, reported in milliamps
    Current,
}

/**
    PWM counter divisor for a given frequency in Hz

    The 2 low bits select a prescaler tier, the other bits are the counter reload value. A frequency out of the supported range `1 ..= 99_999` Hz disables the PWM group (divisor 0).
*/
pub fn pwm_divisor(frequency: f64) -> u16 {
    // (tier, prescaler)
    let (tier, prescaler) =
        if !(frequency >= 1.)  {return 0}
        else if frequency < 10.  {(3, 512.)}
        else if frequency < 100.  {(2, 64.)}
        else if frequency < 1_000.  {(1, 8.)}
        else if frequency < 100_000.  {(0, 1.)}
        else {return 0};
    // the quotient never exceeds 62500 in the accepted range, the cast only truncates
    let reload = (PWM_CLOCK / prescaler / frequency) as u32 & 0xFFFC;
    (tier + reload) as u16
}

/// 16 bit code of a duty cycle in `0 ..= 1`, values out of range saturate
pub fn pwm_duty(duty: f64) -> u16 {
    // float to int casts truncate toward zero and saturate, which is floor on the accepted range
    (f64::from(u16::MAX) * duty.clamp(0., 1.)) as u16
}

/// analog output code was clamped because the requested voltage is not in `0 .. 10`V
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OutOfRange {
    /// requested voltage
    pub requested: f64,
    /// code sent instead
    pub clamped: u16,
}

/// DAC code of an analog output voltage
pub fn analog_output(volts: f64) -> Result<u16, OutOfRange> {
    if volts >= ANALOG_OUTPUT_RANGE {
        Err(OutOfRange {requested: volts, clamped: ANALOG_CODE_MAX})
    }
    else if volts >= 0. {
        Ok((volts * f64::from(ANALOG_CODE_MAX) / ANALOG_OUTPUT_RANGE) as u16)
    }
    // negative, and NaN
    else {
        Err(OutOfRange {requested: volts, clamped: 0})
    }
}

/// volts (or milliamps in current mode) of an analog input code
pub fn analog_input(code: u16, mode: AnalogMode) -> f64 {
    let scale = match mode {
        AnalogMode::Voltage => VOLTAGE_SCALE,
        AnalogMode::Current => CURRENT_SCALE,
    };
    f64::from(code) * scale / f64::from(ANALOG_CODE_MAX)
}
