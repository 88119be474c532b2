//! Operator tool for routing configuration files.
//!
//! ```text
//! audio-route-tool [CONFIG] [ROUTE...]
//! ```
//!
//! Without routes, prints the parsed control graph as JSON. With routes
//! (decimal or `0x` device-type values), enables every direction against
//! an in-memory mixer, applies each route in order and prints the control
//! writes it caused.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use audio_route_core::backends::memory::{MemoryMixer, MixerWrite};
use audio_route_core::{load_file, Direction, EngineConfig, RouteTarget, RoutingEngine};

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| EngineConfig::default().config_path);
    let routes: Vec<String> = args.collect();

    match run(config_path, &routes) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: PathBuf, routes: &[String]) -> Result<(), Box<dyn Error>> {
    let graph = load_file(&config_path)?;
    log::info!("Loaded routing configuration from {}", config_path.display());

    if routes.is_empty() {
        println!("{}", graph.to_json()?);
        return Ok(());
    }

    let targets = routes
        .iter()
        .map(|raw| parse_route(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mixer = MemoryMixer::from_graph(&graph);
    let mut engine = RoutingEngine::new(Arc::new(graph), Arc::new(mixer.clone()));

    for direction in [Direction::Output, Direction::Input, Direction::Modem] {
        engine.set_enabled(direction, true)?;
    }
    print_writes("enable", &mixer);

    for target in targets {
        match engine.route(target) {
            Ok(outcome) => log::debug!("Route {:#x}: {:?}", target.raw(), outcome),
            Err(e) => log::error!("Route {:#x} failed: {e}", target.raw()),
        }
        print_writes(&format!("route {:#x}", target.raw()), &mixer);
    }

    engine.shutdown();
    print_writes("shutdown", &mixer);
    Ok(())
}

fn parse_route(raw: &str) -> Result<RouteTarget, Box<dyn Error>> {
    let value = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16)?,
        None => raw.parse::<u32>()?,
    };
    Ok(RouteTarget::from_raw(value)?)
}

fn print_writes(step: &str, mixer: &MemoryMixer) {
    println!("# {step}");
    for write in mixer.writes() {
        match write {
            MixerWrite::Value { name, index, value } => println!("{name}[{index}] = {value}"),
            MixerWrite::Label { name, label } => println!("{name} = {label}"),
        }
    }
    mixer.clear_writes();
}
