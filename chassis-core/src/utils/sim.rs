//! Simulated drive-train hardware.
//!
//! A `SimWorld` holds the plant state: motor commands, wheel encoder pulses,
//! heading and the rangefinder voltage. Device handles borrow it through a
//! shared `RefCell`, the same way the real backends share an I2C bus, and
//! implement the chassis device ports. `SimWorld::step` moves the robot
//! according to the motor commands.

use core::cell::RefCell;

use embassy_time::Duration;
use libm;

use crate::utils::{
    config::{SIM_TICKS_PER_REV, WHEEL_DIAMETER_IN},
    controllers::{
        seconds, DistanceEncoder, DriveMotors, HeadingSensor, MotorOutput, RangeSensor,
    },
};

/// Physical parameters of the simulated robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    /// Wheel surface speed at full command (ft/s).
    pub max_wheel_speed: f32,
    /// Distance between left and right wheels (ft).
    pub track_width: f32,
    /// Encoder pulses per foot of wheel travel.
    pub pulses_per_foot: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        let circumference_ft = WHEEL_DIAMETER_IN / 12.0 * core::f32::consts::PI;
        SimParams {
            max_wheel_speed: 10.0,
            track_width: 2.0,
            pulses_per_foot: SIM_TICKS_PER_REV / circumference_ft,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorSlot {
    FrontLeft = 0,
    BackLeft = 1,
    FrontRight = 2,
    BackRight = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left = 0,
    Right = 1,
}

/// Simulated plant state.
#[derive(Debug)]
pub struct SimWorld {
    params: SimParams,
    motors: [f32; 4],
    pulses: [i64; 2],
    residue: [f32; 2],
    heading: f32,
    yaw_rate: f32,
    range_voltage: f32,
}

impl SimWorld {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            motors: [0.0; 4],
            pulses: [0; 2],
            residue: [0.0; 2],
            heading: 0.0,
            yaw_rate: 0.0,
            range_voltage: 0.0,
        }
    }

    /// Advance the plant by `elapsed` at the current motor commands.
    ///
    /// Each side moves at the mean of its two motors; the heading turns
    /// clockwise when the left side outruns the right.
    pub fn step(
        &mut self,
        elapsed: Duration,
    ) {
        let dt = seconds(elapsed);
        let left = (self.motors[0] + self.motors[1]) / 2.0 * self.params.max_wheel_speed;
        let right = (self.motors[2] + self.motors[3]) / 2.0 * self.params.max_wheel_speed;

        for (side, speed) in [left, right].into_iter().enumerate() {
            let travelled = speed * dt * self.params.pulses_per_foot + self.residue[side];
            let whole = libm::truncf(travelled);
            self.pulses[side] += whole as i64;
            self.residue[side] = travelled - whole;
        }

        self.yaw_rate = ((left - right) / self.params.track_width).to_degrees();
        self.heading += self.yaw_rate * dt;
    }

    pub fn motor(
        &self,
        slot: MotorSlot,
    ) -> f32 {
        self.motors[slot as usize]
    }

    pub fn pulses(
        &self,
        side: Side,
    ) -> i64 {
        self.pulses[side as usize]
    }

    /// Force an encoder's raw pulse count.
    pub fn set_pulses(
        &mut self,
        side: Side,
        pulses: i64,
    ) {
        self.pulses[side as usize] = pulses;
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn set_heading(
        &mut self,
        heading: f32,
    ) {
        self.heading = heading;
    }

    pub fn set_range_voltage(
        &mut self,
        volts: f32,
    ) {
        self.range_voltage = volts;
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(SimParams::default())
    }
}

pub struct SimMotor<'a> {
    world: &'a RefCell<SimWorld>,
    slot: MotorSlot,
}

impl<'a> SimMotor<'a> {
    pub fn new(
        world: &'a RefCell<SimWorld>,
        slot: MotorSlot,
    ) -> Self {
        Self { world, slot }
    }
}

impl MotorOutput for SimMotor<'_> {
    fn set(
        &mut self,
        speed: f32,
    ) {
        self.world.borrow_mut().motors[self.slot as usize] = speed.clamp(-1.0, 1.0);
    }

    fn get(&self) -> f32 {
        self.world.borrow().motor(self.slot)
    }
}

/// Encoder reading a side's pulses relative to its last reset.
pub struct SimEncoder<'a> {
    world: &'a RefCell<SimWorld>,
    side: Side,
    offset: i64,
    window_start: i64,
    distance_per_pulse: f32,
    rate: f32,
    forward: bool,
}

impl<'a> SimEncoder<'a> {
    pub fn new(
        world: &'a RefCell<SimWorld>,
        side: Side,
    ) -> Self {
        let start = world.borrow().pulses(side);
        Self {
            world,
            side,
            offset: start,
            window_start: start,
            distance_per_pulse: 1.0,
            rate: 0.0,
            forward: true,
        }
    }

    /// Pulses since the last reset.
    pub fn count(&self) -> i64 {
        self.world.borrow().pulses(self.side) - self.offset
    }
}

impl DistanceEncoder for SimEncoder<'_> {
    fn set_distance_per_pulse(
        &mut self,
        distance_per_pulse: f32,
    ) {
        self.distance_per_pulse = distance_per_pulse;
    }

    fn distance(&self) -> f32 {
        self.count() as f32 * self.distance_per_pulse
    }

    fn rate(&self) -> f32 {
        self.rate
    }

    fn direction(&self) -> bool {
        self.forward
    }

    fn reset(&mut self) {
        let now = self.world.borrow().pulses(self.side);
        self.offset = now;
        self.window_start = now;
        self.rate = 0.0;
    }

    fn update(
        &mut self,
        elapsed: Duration,
    ) {
        let secs = seconds(elapsed);
        if secs <= 0.0 {
            return;
        }
        let now = self.world.borrow().pulses(self.side);
        let delta = now - self.window_start;
        if delta != 0 {
            self.forward = delta > 0;
        }
        self.rate = delta as f32 * self.distance_per_pulse / secs;
        self.window_start = now;
    }
}

pub struct SimGyro<'a> {
    world: &'a RefCell<SimWorld>,
    offset: f32,
}

impl<'a> SimGyro<'a> {
    pub fn new(world: &'a RefCell<SimWorld>) -> Self {
        Self { world, offset: 0.0 }
    }
}

impl HeadingSensor for SimGyro<'_> {
    fn angle(&self) -> f32 {
        self.world.borrow().heading - self.offset
    }

    fn rate(&self) -> f32 {
        self.world.borrow().yaw_rate
    }

    fn reset(&mut self) {
        self.offset = self.world.borrow().heading;
    }
}

/// Rangefinder reporting the world's voltage, already in distance units.
pub struct SimRangefinder<'a> {
    world: &'a RefCell<SimWorld>,
}

impl<'a> SimRangefinder<'a> {
    pub fn new(world: &'a RefCell<SimWorld>) -> Self {
        Self { world }
    }
}

impl RangeSensor for SimRangefinder<'_> {
    fn average_voltage(&mut self) -> f32 {
        self.world.borrow().range_voltage
    }
}

/// Motors for all four slots of `world`.
pub fn drive_motors(world: &RefCell<SimWorld>) -> DriveMotors<SimMotor<'_>> {
    DriveMotors {
        front_left: SimMotor::new(world, MotorSlot::FrontLeft),
        back_left: SimMotor::new(world, MotorSlot::BackLeft),
        front_right: SimMotor::new(world, MotorSlot::FrontRight),
        back_right: SimMotor::new(world, MotorSlot::BackRight),
    }
}
