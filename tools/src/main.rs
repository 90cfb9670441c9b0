use std::path::{Path, PathBuf};

use character_motor::{EntityDescriptor, MotionState, MotorProfile};
use clap::{Parser, Subcommand};
use combat::ForcePad;
use engine_core::pool::PoolManager;
use player_controller::{
    create_projectile_pool, player_forms, DirectInputAdapter, PlayerController, PlayerTuning,
    RawInput,
};
use rapier2d::math::{Point, Vector};
use test_map::TestMap;

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_MAP: i32 = 10;
const EXIT_PROFILE: i32 = 11;

const TICK_RATE: f32 = 60.0;
const PLAYER_WIDTH: f32 = 0.8;
const PLAYER_HEIGHT: f32 = 1.6;

#[derive(Parser)]
#[command(name = "tools", version, about = "Platformer movement tools CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a headless player simulation on a test map.
    Simulate(SimulateArgs),
    /// Parses and validates a test map.
    ValidateMap {
        #[arg(long, value_name = "PATH")]
        map: PathBuf,
    },
}

#[derive(Parser)]
struct SimulateArgs {
    #[arg(long, value_name = "PATH")]
    map: PathBuf,

    /// Motor profile TOML; defaults to the platformer profile.
    #[arg(long, value_name = "PATH")]
    profile: Option<PathBuf>,

    /// Player tuning TOML.
    #[arg(long, value_name = "PATH")]
    tuning: Option<PathBuf>,

    #[arg(long, default_value_t = 240)]
    ticks: u32,

    /// Horizontal stick input held for the whole run, -1..1.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    move_x: f32,

    /// Tick at which jump is pressed (held for `--jump-hold` ticks).
    #[arg(long, value_name = "TICK")]
    jump_at: Option<u32>,

    #[arg(long, default_value_t = 12)]
    jump_hold: u32,

    #[arg(long, value_name = "TICK")]
    dash_at: Option<u32>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Simulate(args) => run_simulate(args),
        Commands::ValidateMap { map } => run_validate_map(&map),
    };
    std::process::exit(exit_code);
}

fn run_validate_map(path: &Path) -> i32 {
    let map = match load_map(path) {
        Ok(map) => map,
        Err(code) => return code,
    };
    let validation = map.validate();
    for warning in &validation.warnings {
        println!("warning: {}", warning);
    }
    for error in &validation.errors {
        println!("error: {}", error);
    }
    if !validation.is_ok() {
        return EXIT_MAP;
    }
    match map.expanded_solids() {
        Ok(solids) => {
            println!(
                "map '{}' ok: {} solids, {} pads",
                map.name,
                solids.len(),
                map.pads.len()
            );
            EXIT_SUCCESS
        }
        Err(err) => {
            println!("error: {}", err);
            EXIT_MAP
        }
    }
}

fn run_simulate(args: SimulateArgs) -> i32 {
    if !args.move_x.is_finite() || args.move_x.abs() > 1.0 {
        eprintln!("--move-x must be within -1..1");
        return EXIT_USAGE;
    }
    let map = match load_map(&args.map) {
        Ok(map) => map,
        Err(code) => return code,
    };
    let world = match map.build_world() {
        Ok(world) => world,
        Err(err) => {
            eprintln!("map build failed: {}", err);
            return EXIT_MAP;
        }
    };
    let profile = match &args.profile {
        Some(path) => match read_text(path).and_then(|text| {
            MotorProfile::parse_toml(&text).map_err(|err| err.to_string())
        }) {
            Ok(profile) => profile,
            Err(err) => {
                eprintln!("profile {}: {}", path.display(), err);
                return EXIT_PROFILE;
            }
        },
        None => MotorProfile::platformer_default(),
    };
    let tuning = match &args.tuning {
        Some(path) => match read_text(path).and_then(|text| PlayerTuning::parse_toml(&text)) {
            Ok(tuning) => tuning,
            Err(err) => {
                eprintln!("tuning {}: {}", path.display(), err);
                return EXIT_PROFILE;
            }
        },
        None => PlayerTuning::platformer_default(),
    };

    let mut pads: Vec<ForcePad> = map
        .pads
        .iter()
        .map(|pad| {
            ForcePad::new(
                Point::new(pad.pos[0], pad.pos[1]),
                Vector::new(pad.size[0] * 0.5, pad.size[1] * 0.5),
                Vector::new(pad.up[0], pad.up[1]),
                pad.push_force,
            )
        })
        .collect();

    let mut descriptor = EntityDescriptor::new("player", player_forms(PLAYER_WIDTH, PLAYER_HEIGHT));
    descriptor.profile = profile;
    let spawn = map.spawn_point();
    let mut player = PlayerController::new(
        DirectInputAdapter::default(),
        descriptor,
        tuning,
        Point::new(spawn[0], spawn[1]),
    );
    let mut shots = PoolManager::new();
    if let Err(err) = create_projectile_pool(&mut shots) {
        eprintln!("projectile pool: {}", err);
        return EXIT_USAGE;
    }

    log::debug!("simulating {} ticks on map '{}'", args.ticks, map.name);
    let dt = 1.0 / TICK_RATE;
    let mut last_state = player.entity().state();
    println!("tick {:>5}: spawn at ({:.3}, {:.3}) {:?}", 0, spawn[0], spawn[1], last_state);
    for tick in 0..args.ticks {
        let jump = args
            .jump_at
            .is_some_and(|start| tick >= start && tick < start + args.jump_hold);
        let raw = RawInput {
            move_x: args.move_x,
            jump,
            dash: args.dash_at == Some(tick),
            ..Default::default()
        };
        let frame = player.tick(&world, raw, &mut shots, dt);
        for pad in &mut pads {
            if player.touch_force_pad(pad) {
                println!("tick {:>5}: launched by force pad", tick + 1);
            }
        }
        if frame.state != last_state {
            println!(
                "tick {:>5}: {:?} -> {:?} at ({:.3}, {:.3}) jumps={}",
                tick + 1,
                last_state,
                frame.state,
                frame.position.x,
                frame.position.y,
                frame.jumps
            );
            last_state = frame.state;
        }
    }
    let position = player.entity().position();
    let grounded = player.entity().state() == MotionState::Grounded;
    println!(
        "final: ({:.3}, {:.3}) {:?} grounded={} ticks={}",
        position.x,
        position.y,
        player.entity().state(),
        grounded,
        args.ticks
    );
    EXIT_SUCCESS
}

fn load_map(path: &Path) -> Result<TestMap, i32> {
    let text = match read_text(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{}", err);
            return Err(EXIT_MAP);
        }
    };
    TestMap::parse_toml(&text).map_err(|err| {
        eprintln!("map parse failed: {}", err);
        EXIT_MAP
    })
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|err| format!("read {} failed: {}", path.display(), err))
}
