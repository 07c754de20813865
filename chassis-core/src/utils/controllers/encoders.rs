//! Software quadrature decoding on two digital inputs.
//!
//! `sample` (or `DistanceEncoder::poll`) must be called faster than the
//! encoder can make two transitions, from a fast poll loop or the pin-change
//! interrupt. Every valid transition of
//! the A/B pair counts one pulse (x4 decoding). Rate is derived per control
//! tick in `update`.

use embassy_time::Duration;
use embedded_hal::digital::InputPin;

use super::{seconds, DeviceError, DistanceEncoder};

/// Count delta indexed by `previous << 2 | current`, with state `A << 1 | B`.
/// A leading B counts up. Illegal double transitions count zero.
const TRANSITIONS: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

pub struct QuadratureEncoder<A, B> {
    a: A,
    b: B,
    state: u8,
    count: i32,
    window_start: i32,
    rate: f32,
    distance_per_pulse: f32,
    reversed: bool,
    forward: bool,
    missed: u32,
}

impl<A, B, E> QuadratureEncoder<A, B>
where
    A: InputPin<Error = E>,
    B: InputPin<Error = E>,
    E: core::fmt::Debug,
{
    /// Take ownership of the A and B pins and latch their current state.
    pub fn new(
        mut a: A,
        mut b: B,
    ) -> Result<Self, DeviceError<E>> {
        let state = read_state(&mut a, &mut b)?;
        Ok(Self {
            a,
            b,
            state,
            count: 0,
            window_start: 0,
            rate: 0.0,
            distance_per_pulse: 1.0,
            reversed: false,
            forward: true,
            missed: 0,
        })
    }

    /// Swap the counting direction, for encoders mounted mirrored.
    pub fn reversed(
        mut self,
        reversed: bool,
    ) -> Self {
        self.reversed = reversed;
        self
    }

    /// Read the pins once and apply the transition. Returns the count delta.
    pub fn sample(&mut self) -> Result<i8, DeviceError<E>> {
        let current = read_state(&mut self.a, &mut self.b)?;
        let index = ((self.state << 2) | current) as usize;
        let mut delta = TRANSITIONS[index];
        if delta == 0 && current != self.state {
            self.missed += 1;
            tracing::debug!(missed = self.missed, "quadrature step skipped");
        }
        if self.reversed {
            delta = -delta;
        }
        if delta != 0 {
            self.count += delta as i32;
            self.forward = delta > 0;
        }
        self.state = current;
        Ok(delta)
    }

    /// Raw pulse count since the last reset.
    pub fn count(&self) -> i32 {
        self.count
    }

    /// Transitions that skipped a state and were not counted.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Give back the pins.
    pub fn release(self) -> (A, B) {
        (self.a, self.b)
    }
}

fn read_state<A, B, E>(
    a: &mut A,
    b: &mut B,
) -> Result<u8, DeviceError<E>>
where
    A: InputPin<Error = E>,
    B: InputPin<Error = E>,
    E: core::fmt::Debug,
{
    let a = a.is_high().map_err(DeviceError::PinError)?;
    let b = b.is_high().map_err(DeviceError::PinError)?;
    Ok(((a as u8) << 1) | b as u8)
}

impl<A, B, E> DistanceEncoder for QuadratureEncoder<A, B>
where
    A: InputPin<Error = E>,
    B: InputPin<Error = E>,
    E: core::fmt::Debug,
{
    fn set_distance_per_pulse(
        &mut self,
        distance_per_pulse: f32,
    ) {
        self.distance_per_pulse = distance_per_pulse;
    }

    fn distance(&self) -> f32 {
        self.count as f32 * self.distance_per_pulse
    }

    fn rate(&self) -> f32 {
        self.rate
    }

    fn direction(&self) -> bool {
        self.forward
    }

    fn reset(&mut self) {
        self.count = 0;
        self.window_start = 0;
        self.rate = 0.0;
    }

    fn poll(&mut self) {
        if let Err(e) = self.sample() {
            tracing::error!("Failed to read encoder pins: {:?}", e);
        }
    }

    fn update(
        &mut self,
        elapsed: Duration,
    ) {
        let secs = seconds(elapsed);
        if secs <= 0.0 {
            return;
        }
        let pulses = self.count - self.window_start;
        self.rate = pulses as f32 * self.distance_per_pulse / secs;
        self.window_start = self.count;
    }
}
