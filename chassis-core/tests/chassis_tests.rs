use core::cell::RefCell;

use chassis_core::utils::{
    command::{Axes, Behavior, DriveWithJoystick, Scheduler},
    config::{
        Calibration, ChannelClass, ChannelMap, ChassisConfig, HardwareMode, DRIVE_TRAIN,
        REAL_DISTANCE_PER_PULSE, SIM_DISTANCE_PER_PULSE,
    },
    controllers::{Chassis, ChassisDevices, ChassisError, DistanceEncoder, QuadratureEncoder},
    sim::{drive_motors, MotorSlot, Side, SimEncoder, SimGyro, SimMotor, SimRangefinder, SimWorld},
    telemetry::{DeviceInfo, Role, TelemetryTable},
    Duration,
};
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};

type SimChassis<'a> = Chassis<SimMotor<'a>, SimEncoder<'a>, SimRangefinder<'a>, SimGyro<'a>>;

fn build<'a>(
    world: &'a RefCell<SimWorld>,
    config: &ChassisConfig,
    table: &mut TelemetryTable,
) -> Result<SimChassis<'a>, ChassisError> {
    let devices = ChassisDevices {
        motors: drive_motors(world),
        left_encoder: SimEncoder::new(world, Side::Left),
        right_encoder: SimEncoder::new(world, Side::Right),
        rangefinder: SimRangefinder::new(world),
        gyro: SimGyro::new(world),
    };
    Chassis::new(config, devices, table)
}

fn sim_chassis(world: &RefCell<SimWorld>) -> SimChassis<'_> {
    build(
        world,
        &ChassisConfig::for_mode(HardwareMode::Simulated),
        &mut TelemetryTable::new(),
    )
    .unwrap()
}

fn approx(
    a: f32,
    b: f32,
) -> bool {
    (a - b).abs() < 1e-5
}

fn motors(world: &RefCell<SimWorld>) -> [f32; 4] {
    let w = world.borrow();
    [
        w.motor(MotorSlot::FrontLeft),
        w.motor(MotorSlot::BackLeft),
        w.motor(MotorSlot::FrontRight),
        w.motor(MotorSlot::BackRight),
    ]
}

/// Pin reads, one per level.
fn levels(states: &[PinState]) -> Vec<PinTransaction> {
    states.iter().map(|&s| PinTransaction::get(s)).collect()
}

#[derive(Default)]
struct RecordingScheduler {
    defaults: Vec<(&'static str, Behavior)>,
}

impl Scheduler for RecordingScheduler {
    fn set_default_command(
        &mut self,
        subsystem: &'static str,
        behavior: Behavior,
    ) {
        self.defaults.push((subsystem, behavior));
    }
}

#[test]
fn tank_drive_commands_left_and_right_pairs() {
    let world = RefCell::new(SimWorld::default());
    let mut chassis = sim_chassis(&world);
    let token = chassis.claim("test").unwrap();

    let speeds = [-1.0, -0.5, 0.0, 0.3, 1.0];
    for &left in &speeds {
        for &right in &speeds {
            chassis.drive_tank(&token, left, right).unwrap();
            assert_eq!(motors(&world), [left, left, right, right]);
            assert_eq!(chassis.motors().speeds(), [left, left, right, right]);
        }
    }
}

#[test]
fn joystick_drive_mixes_and_desaturates() {
    let world = RefCell::new(SimWorld::default());
    let mut chassis = sim_chassis(&world);
    let token = chassis.claim("test").unwrap();

    chassis
        .drive_joystick(&token, &Axes {
            forward: 0.5,
            turn: 0.25,
        })
        .unwrap();
    assert_eq!(motors(&world), [0.75, 0.75, 0.25, 0.25]);

    chassis
        .drive_joystick(&token, &Axes {
            forward: 1.0,
            turn: 1.0,
        })
        .unwrap();
    assert_eq!(motors(&world), [1.0, 1.0, 0.0, 0.0]);
}

#[test]
fn distance_is_mean_of_both_encoders() {
    let world = RefCell::new(SimWorld::default());
    let chassis = sim_chassis(&world);

    for (l, r) in [(0, 0), (100, 300), (-50, 250), (720, 720)] {
        world.borrow_mut().set_pulses(Side::Left, l);
        world.borrow_mut().set_pulses(Side::Right, r);
        let expected =
            (chassis.left_encoder().distance() + chassis.right_encoder().distance()) / 2.0;
        assert_eq!(chassis.distance(), expected);
        assert!(approx(
            chassis.distance(),
            (l + r) as f32 / 2.0 * SIM_DISTANCE_PER_PULSE
        ));
    }
}

#[test]
fn distance_per_pulse_follows_hardware_mode() {
    let world = RefCell::new(SimWorld::default());
    let mut table = TelemetryTable::new();

    let real = build(&world, &ChassisConfig::for_mode(HardwareMode::Real), &mut table).unwrap();
    let sim = build(
        &world,
        &ChassisConfig::for_mode(HardwareMode::Simulated),
        &mut table,
    )
    .unwrap();
    assert_eq!(real.calibration().encoder_distance_per_pulse, 0.042);
    assert_eq!(
        sim.calibration().encoder_distance_per_pulse,
        (4.0 / 12.0 * std::f32::consts::PI) / 360.0
    );

    world.borrow_mut().set_pulses(Side::Left, 360);
    assert!(approx(real.left_encoder().distance(), 360.0 * REAL_DISTANCE_PER_PULSE));
    // One simulated wheel revolution: 4 in wheel, a third of a foot times pi.
    assert!(approx(
        sim.left_encoder().distance(),
        4.0 / 12.0 * std::f32::consts::PI
    ));
}

#[test]
fn obstacle_distance_scales_only_on_real_hardware() {
    let world = RefCell::new(SimWorld::default());
    world.borrow_mut().set_range_voltage(2.0);
    let mut table = TelemetryTable::new();

    let mut real = build(&world, &ChassisConfig::for_mode(HardwareMode::Real), &mut table).unwrap();
    let mut sim = build(
        &world,
        &ChassisConfig::for_mode(HardwareMode::Simulated),
        &mut table,
    )
    .unwrap();

    assert!(approx(real.distance_to_obstacle(), 0.2));
    assert_eq!(sim.distance_to_obstacle(), 2.0);
}

#[test]
fn calibration_override_is_used() {
    let world = RefCell::new(SimWorld::default());
    world.borrow_mut().set_range_voltage(2.0);
    let config = ChassisConfig {
        calibration: Some(Calibration {
            encoder_distance_per_pulse: 0.5,
            obstacle_scale: 0.25,
        }),
        ..ChassisConfig::for_mode(HardwareMode::Real)
    };
    let mut chassis = build(&world, &config, &mut TelemetryTable::new()).unwrap();
    // Encoders start from zero, so move them after construction.
    world.borrow_mut().set_pulses(Side::Right, 10);
    assert_eq!(chassis.right_encoder().distance(), 5.0);
    world.borrow_mut().set_pulses(Side::Left, 10);
    assert_eq!(chassis.distance(), 5.0);
    assert_eq!(chassis.distance_to_obstacle(), 0.5);
}

#[test]
fn reset_zeroes_heading_and_encoders() {
    let world = RefCell::new(SimWorld::default());
    let mut chassis = sim_chassis(&world);
    let token = chassis.claim("test").unwrap();

    chassis.drive_tank(&token, 0.8, 0.4).unwrap();
    for _ in 0..10 {
        world.borrow_mut().step(Duration::from_millis(20));
        chassis.periodic(Duration::from_millis(20));
    }
    assert!(chassis.heading() > 0.0);
    assert!(chassis.distance() > 0.0);
    assert!(chassis.left_encoder().rate() > 0.0);

    chassis.reset();
    assert_eq!(chassis.heading(), 0.0);
    assert_eq!(chassis.left_encoder().distance(), 0.0);
    assert_eq!(chassis.right_encoder().distance(), 0.0);
    assert_eq!(chassis.left_encoder().rate(), 0.0);
    assert_eq!(chassis.right_encoder().rate(), 0.0);
    assert_eq!(chassis.distance(), 0.0);
}

#[test]
fn log_publishes_each_key_exactly_once() {
    let world = RefCell::new(SimWorld::default());
    let mut table = TelemetryTable::new();
    let mut chassis = build(
        &world,
        &ChassisConfig::for_mode(HardwareMode::Simulated),
        &mut table,
    )
    .unwrap();

    chassis.log(&mut table);

    let mut keys: Vec<&str> = table.keys(DRIVE_TRAIN).collect();
    keys.sort_unstable();
    let mut expected = vec![
        "Left Distance",
        "Right Distance",
        "Combined distance",
        "Left Speed",
        "Right Speed",
        "Gyro Angle",
        "Gyro Rate",
        "FL motor speed",
        "BL motor speed",
        "FR motor speed",
        "BR motor speed",
        "Left Encoder direction",
        "Right Encoder direction",
        "RangeFinder",
    ];
    expected.sort_unstable();
    assert_eq!(keys, expected);
    assert_eq!(table.publish_count(), expected.len());

    chassis.log(&mut table);
    assert_eq!(table.publish_count(), 2 * expected.len());
}

#[test]
fn log_reports_current_readings() {
    let world = RefCell::new(SimWorld::default());
    let mut table = TelemetryTable::new();
    let mut chassis = build(
        &world,
        &ChassisConfig::for_mode(HardwareMode::Simulated),
        &mut table,
    )
    .unwrap();
    let token = chassis.claim("test").unwrap();

    chassis.drive_tank(&token, -0.5, 0.5).unwrap();
    world.borrow_mut().step(Duration::from_millis(100));
    chassis.periodic(Duration::from_millis(100));
    world.borrow_mut().set_range_voltage(1.25);
    chassis.log(&mut table);

    assert_eq!(table.number(DRIVE_TRAIN, "FL motor speed"), Some(-0.5));
    assert_eq!(table.number(DRIVE_TRAIN, "BR motor speed"), Some(0.5));
    assert_eq!(table.text(DRIVE_TRAIN, "Left Encoder direction"), Some("BKWD"));
    assert_eq!(table.text(DRIVE_TRAIN, "Right Encoder direction"), Some("FWRD"));
    assert_eq!(table.number(DRIVE_TRAIN, "RangeFinder"), Some(1.25));
    assert_eq!(table.number(DRIVE_TRAIN, "Gyro Angle"), Some(chassis.heading()));
    assert_eq!(
        table.number(DRIVE_TRAIN, "Combined distance"),
        Some(chassis.distance())
    );
}

#[test]
fn construction_registers_devices() {
    let world = RefCell::new(SimWorld::default());
    let mut table = TelemetryTable::new();
    build(
        &world,
        &ChassisConfig::for_mode(HardwareMode::Simulated),
        &mut table,
    )
    .unwrap();

    let regs: Vec<(&str, Role, DeviceInfo)> = table
        .registrations()
        .iter()
        .map(|r| {
            assert_eq!(r.group, DRIVE_TRAIN);
            (r.label.as_str(), r.role, r.device)
        })
        .collect();
    assert_eq!(regs, vec![
        ("Front_Left Motor", Role::Actuator, DeviceInfo::Motor { channel: 1 }),
        ("Back Left Motor", Role::Actuator, DeviceInfo::Motor { channel: 2 }),
        ("Front Right Motor", Role::Actuator, DeviceInfo::Motor { channel: 3 }),
        ("Back Right Motor", Role::Actuator, DeviceInfo::Motor { channel: 4 }),
        ("Left Encoder", Role::Sensor, DeviceInfo::Encoder { a: 1, b: 2 }),
        ("Right Encoder", Role::Sensor, DeviceInfo::Encoder { a: 3, b: 4 }),
        ("Rangefinder", Role::Sensor, DeviceInfo::Rangefinder { channel: 6 }),
        ("Gyro", Role::Sensor, DeviceInfo::Gyro { channel: 1 }),
    ]);
}

#[test]
fn conflicting_channels_are_rejected() {
    let world = RefCell::new(SimWorld::default());
    let mut table = TelemetryTable::new();
    let config = ChassisConfig {
        channels: ChannelMap {
            rangefinder: 1,
            ..Default::default()
        },
        ..ChassisConfig::for_mode(HardwareMode::Simulated)
    };

    let err = build(&world, &config, &mut table).err();
    assert_eq!(
        err,
        Some(ChassisError::ChannelConflict {
            class: ChannelClass::Analog,
            channel: 1,
        })
    );
    assert!(table.registrations().is_empty());
}

#[test]
fn default_command_is_joystick_drive() {
    let world = RefCell::new(SimWorld::default());
    let chassis = sim_chassis(&world);
    let mut scheduler = RecordingScheduler::default();

    chassis.init_default_command(&mut scheduler);
    assert_eq!(scheduler.defaults, vec![(DRIVE_TRAIN, Behavior::DriveWithJoystick)]);
}

#[test]
fn only_one_owner_drives_at_a_time() {
    let world = RefCell::new(SimWorld::default());
    let mut chassis = sim_chassis(&world);

    let first = chassis.claim("first").unwrap();
    assert_eq!(first.owner(), "first");
    assert_eq!(
        chassis.claim("second"),
        Err(ChassisError::AlreadyClaimed { holder: "first" })
    );

    let second = chassis.preempt("second");
    assert_eq!(chassis.owner(), Some("second"));
    assert_eq!(
        chassis.drive_tank(&first, 1.0, 1.0),
        Err(ChassisError::StaleToken)
    );
    assert_eq!(motors(&world), [0.0; 4]);

    chassis.drive_tank(&second, 0.2, 0.2).unwrap();
    chassis.release(second).unwrap();
    assert_eq!(chassis.owner(), None);
    assert_eq!(chassis.stop(&first), Err(ChassisError::NotClaimed));
    assert_eq!(chassis.release(first), Err(ChassisError::NotClaimed));
}

#[test]
fn joystick_behavior_claims_drives_and_stops() {
    let world = RefCell::new(SimWorld::default());
    let mut chassis = sim_chassis(&world);
    let mut behavior = DriveWithJoystick::new();

    assert_eq!(
        behavior.execute(&mut chassis, &Axes::default()),
        Err(ChassisError::NotClaimed)
    );

    behavior.initialize(&mut chassis).unwrap();
    assert!(behavior.is_running());
    assert_eq!(chassis.owner(), Some(DriveWithJoystick::NAME));

    behavior
        .execute(&mut chassis, &Axes {
            forward: 1.0,
            turn: 0.5,
        })
        .unwrap();
    let [fl, bl, fr, br] = motors(&world);
    assert!(approx(fl, 1.0) && approx(bl, 1.0));
    assert!(approx(fr, 0.5 / 1.5) && approx(br, 0.5 / 1.5));
    assert!(!behavior.is_finished());

    behavior.end(&mut chassis).unwrap();
    assert!(!behavior.is_running());
    assert_eq!(motors(&world), [0.0; 4]);
    assert_eq!(chassis.owner(), None);
}

#[test]
fn preempted_behavior_cannot_drive() {
    let world = RefCell::new(SimWorld::default());
    let mut chassis = sim_chassis(&world);
    let mut behavior = DriveWithJoystick::new();
    behavior.initialize(&mut chassis).unwrap();

    let _auto = chassis.preempt("autonomous");
    assert_eq!(
        behavior.execute(&mut chassis, &Axes {
            forward: 1.0,
            turn: 0.0,
        }),
        Err(ChassisError::StaleToken)
    );
    assert_eq!(behavior.end(&mut chassis), Err(ChassisError::StaleToken));
    assert_eq!(chassis.owner(), Some("autonomous"));
}

#[test]
fn periodic_samples_quadrature_encoders() {
    use PinState::{High, Low};
    let world = RefCell::new(SimWorld::default());
    // Initial latch, then A leads B through one full cycle, one step per tick.
    let a = levels(&[Low, High, High, Low, Low]);
    let b = levels(&[Low, Low, High, High, Low]);
    let pins = [
        PinMock::new(&a),
        PinMock::new(&b),
        PinMock::new(&a),
        PinMock::new(&b),
    ];

    let devices = ChassisDevices {
        motors: drive_motors(&world),
        left_encoder: QuadratureEncoder::new(pins[0].clone(), pins[1].clone()).unwrap(),
        right_encoder: QuadratureEncoder::new(pins[2].clone(), pins[3].clone()).unwrap(),
        rangefinder: SimRangefinder::new(&world),
        gyro: SimGyro::new(&world),
    };
    let mut table = TelemetryTable::new();
    let mut chassis = Chassis::new(
        &ChassisConfig::for_mode(HardwareMode::Real),
        devices,
        &mut table,
    )
    .unwrap();

    for _ in 0..4 {
        chassis.periodic(Duration::from_millis(20));
    }

    let travelled = 4.0 * REAL_DISTANCE_PER_PULSE;
    assert_eq!(chassis.left_encoder().count(), 4);
    assert_eq!(chassis.right_encoder().count(), 4);
    assert_eq!(chassis.distance(), travelled);
    assert!(chassis.left_encoder().direction());
    assert!(approx(
        chassis.left_encoder().rate(),
        REAL_DISTANCE_PER_PULSE / 0.02
    ));

    chassis.log(&mut table);
    assert_eq!(table.number(DRIVE_TRAIN, "Left Distance"), Some(travelled));
    assert_eq!(table.number(DRIVE_TRAIN, "Right Distance"), Some(travelled));

    for mut pin in pins {
        pin.done();
    }
}
