use chassis_core::mk_static;
use chassis_core::utils::command::{Axes, Behavior, DriveWithJoystick, Scheduler};
use chassis_core::utils::config::{ChassisConfig, HardwareMode, DRIVE_TRAIN};
use chassis_core::utils::controllers::{Chassis, ChassisDevices};
use chassis_core::utils::sim::{
    drive_motors, Side, SimEncoder, SimGyro, SimMotor, SimRangefinder, SimWorld,
};
use chassis_core::utils::telemetry::TelemetryTable;
use clap::Parser;
use core::cell::RefCell;
use embassy_executor::{Executor, Spawner};
use embassy_time::{Duration, Ticker};
use serde::Deserialize;
use static_cell::StaticCell;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

type SimChassis = Chassis<
    SimMotor<'static>,
    SimEncoder<'static>,
    SimRangefinder<'static>,
    SimGyro<'static>,
>;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// JSON chassis config; defaults to the simulator calibration
    #[clap(long)]
    config: Option<PathBuf>,
    /// use real-hardware calibration when no config file is given
    #[clap(long)]
    real: bool,
    /// JSON joystick script: a list of {"forward", "turn", "ticks"} steps
    #[clap(long)]
    script: Option<PathBuf>,
    /// control loop rate in Hz
    #[clap(long, default_value_t = 50)]
    rate: u64,
    /// publish telemetry every N ticks
    #[clap(long, default_value_t = 25)]
    log_every: u32,
    /// rangefinder reading of the simulated obstacle
    #[clap(long, default_value_t = 2.0)]
    range_voltage: f32,
}

/// One segment of a scripted joystick run.
#[derive(Debug, Clone, Copy, Deserialize)]
struct ScriptStep {
    #[serde(flatten)]
    axes: Axes,
    ticks: u32,
}

fn default_script() -> Vec<ScriptStep> {
    let step = |forward, turn, ticks| ScriptStep {
        axes: Axes { forward, turn },
        ticks,
    };
    vec![step(0.8, 0.0, 100), step(0.4, 0.5, 50), step(0.0, 0.0, 10)]
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Records the default behavior each subsystem asks for.
#[derive(Default)]
struct HostScheduler {
    default: Option<(&'static str, Behavior)>,
}

impl Scheduler for HostScheduler {
    fn set_default_command(
        &mut self,
        subsystem: &'static str,
        behavior: Behavior,
    ) {
        info!(subsystem, ?behavior, "default command registered");
        self.default = Some((subsystem, behavior));
    }
}

#[embassy_executor::task]
async fn drive_task(
    world: &'static RefCell<SimWorld>,
    mut chassis: SimChassis,
    mut table: TelemetryTable,
    script: Vec<ScriptStep>,
    period: Duration,
    log_every: u32,
) {
    let mut scheduler = HostScheduler::default();
    chassis.init_default_command(&mut scheduler);

    let mut behavior = match scheduler.default {
        Some((_, Behavior::DriveWithJoystick)) => DriveWithJoystick::new(),
        None => {
            warn!("no default command registered");
            std::process::exit(1);
        }
    };
    if let Err(e) = behavior.initialize(&mut chassis) {
        error!("failed to start {}: {}", DriveWithJoystick::NAME, e);
        std::process::exit(1);
    }

    let mut ticker = Ticker::every(period);
    let mut tick: u32 = 0;
    for step in &script {
        info!(forward = step.axes.forward, turn = step.axes.turn, ticks = step.ticks, "script step");
        for _ in 0..step.ticks {
            if let Err(e) = behavior.execute(&mut chassis, &step.axes) {
                error!("drive command rejected: {}", e);
            }
            world.borrow_mut().step(period);
            chassis.periodic(period);

            tick += 1;
            if tick % log_every == 0 {
                publish(&mut chassis, &mut table);
            }
            ticker.next().await;
        }
    }

    if let Err(e) = behavior.end(&mut chassis) {
        error!("failed to stop {}: {}", DriveWithJoystick::NAME, e);
    }
    publish(&mut chassis, &mut table);
    info!(
        heading = chassis.heading(),
        distance = chassis.distance(),
        "script finished"
    );
    std::process::exit(0);
}

fn publish(
    chassis: &mut SimChassis,
    table: &mut TelemetryTable,
) {
    chassis.log(table);
    match table.to_json() {
        Ok(json) => info!(group = DRIVE_TRAIN, "{}", json),
        Err(e) => error!("failed to render telemetry: {}", e),
    }
}

#[embassy_executor::task]
async fn main_task(spawner: Spawner) {
    let opts: Opts = Opts::parse();

    let config = match &opts.config {
        Some(path) => match read_json::<ChassisConfig>(path) {
            Ok(config) => config,
            Err(e) => {
                error!("invalid config {}", e);
                std::process::exit(2);
            }
        },
        None if opts.real => ChassisConfig::for_mode(HardwareMode::Real),
        None => ChassisConfig::for_mode(HardwareMode::Simulated),
    };
    let script = match &opts.script {
        Some(path) => match read_json::<Vec<ScriptStep>>(path) {
            Ok(script) => script,
            Err(e) => {
                error!("invalid script {}", e);
                std::process::exit(2);
            }
        },
        None => default_script(),
    };

    let world = mk_static!(RefCell<SimWorld>, RefCell::new(SimWorld::default()));
    world.borrow_mut().set_range_voltage(opts.range_voltage);
    let world: &'static RefCell<SimWorld> = world;

    let devices = ChassisDevices {
        motors: drive_motors(world),
        left_encoder: SimEncoder::new(world, Side::Left),
        right_encoder: SimEncoder::new(world, Side::Right),
        rangefinder: SimRangefinder::new(world),
        gyro: SimGyro::new(world),
    };
    let mut table = TelemetryTable::new();
    let chassis = match Chassis::new(&config, devices, &mut table) {
        Ok(chassis) => chassis,
        Err(e) => {
            error!("drive train setup failed: {}", e);
            std::process::exit(2);
        }
    };

    let period = Duration::from_micros(1_000_000 / opts.rate.max(1));
    info!(mode = ?config.mode, rate = opts.rate, steps = script.len(), "starting drive loop");
    spawner
        .spawn(drive_task(
            world,
            chassis,
            table,
            script,
            period,
            opts.log_every.max(1),
        ))
        .unwrap();
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner)).unwrap();
    });
}
