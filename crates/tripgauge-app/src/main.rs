// Headless TripGauge shell: drives the speedometer from a simulated or
// replayed location sensor and exposes the trip/refill/settings operations.
//
// Usage:
//   tripgauge [drive [seconds]]          record a trip (demo sensor, or the
//                                        track log in TRIPGAUGE_TRACK)
//   tripgauge history                    list trips and refills
//   tripgauge fuel                       show the fuel gauge
//   tripgauge refill <litres> <cost> [full]
//   tripgauge settings <km_per_litre> <tank_litres>
//   tripgauge calc <amount> <price_per_litre>
//   tripgauge record <out.csv> [fixes]   write a simulated track log
//   tripgauge reset                      delete all data
//
// Environment: TRIPGAUGE_CONFIG (config file, default ./tripgauge.json),
// TRIPGAUGE_TRACK (CSV track log to replay), TRIPGAUGE_SPEEDUP (replay
// time scale, default 1), RUST_LOG.

mod view;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::info;

use tripgauge_core::config::CONFIG_FILE;
use tripgauge_core::prelude::*;
use tripgauge_core::sensor::{write_track_csv, DemoDrive};

const DEFAULT_DRIVE_SECS: u64 = 60;
const DEFAULT_RECORD_FIXES: usize = 300;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("drive");
    let rest: &[String] = args.get(1..).unwrap_or(&[]);

    let config_path = env::var("TRIPGAUGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));
    let config = AppConfig::load(Some(&config_path))
        .with_context(|| format!("loading {}", config_path.display()))?;

    if command == "calc" {
        return calc(rest);
    }
    if command == "record" {
        return record(rest);
    }

    let store = RecordStore::open(config.store_path.as_deref()).context("opening record store")?;
    info!(path = %store.path.display(), "using record store");

    let state = SharedState::new(config.vehicle.clone());
    let mut controller = TripController::new(state, store, config.vehicle.clone());
    controller.load_settings();

    match command {
        "drive" => drive(&mut controller, &config, rest).await,
        "history" => {
            print!("{}", view::history(&controller.history()));
            Ok(())
        }
        "fuel" => {
            println!("{}", view::fuel(&controller.fuel_status()));
            Ok(())
        }
        "refill" => {
            let [litres, cost, extra @ ..] = rest else {
                bail!("usage: tripgauge refill <litres> <cost> [full]");
            };
            let full_tank = extra.first().is_some_and(|s| s == "full");
            let refill = controller.log_refill(&RefillForm::new(litres.as_str(), cost.as_str(), full_tank))?;
            println!("{}", refill);
            println!("{}", view::fuel(&controller.fuel_status()));
            Ok(())
        }
        "settings" => {
            let [average, tank, ..] = rest else {
                let snap = controller.state().snapshot();
                let current = SettingsForm::from_values(
                    snap.vehicle_average_km_per_litre,
                    snap.tank_size_litres,
                );
                println!(
                    "Vehicle average: {} km/L, tank size: {} L",
                    current.vehicle_average, current.tank_size
                );
                return Ok(());
            };
            controller.save_settings(&SettingsForm::new(average.as_str(), tank.as_str()))?;
            println!("{}", view::fuel(&controller.fuel_status()));
            Ok(())
        }
        "reset" => {
            controller.delete_all_data()?;
            println!("All trips, refills and settings deleted.");
            Ok(())
        }
        other => bail!("unknown command '{}'", other),
    }
}

/// Record one trip from the configured sensor, printing a readout each second
async fn drive(controller: &mut TripController, config: &AppConfig, args: &[String]) -> Result<()> {
    let (sensor, limit): (Box<dyn LocationSensor>, Option<Duration>) =
        match env::var_os("TRIPGAUGE_TRACK") {
            Some(track) => {
                let speedup = env::var("TRIPGAUGE_SPEEDUP")
                    .ok()
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(1.0);
                let replay = ReplaySensor::from_csv(&track)
                    .with_context(|| format!("reading track log {}", PathBuf::from(&track).display()))?
                    .with_time_scale(speedup);
                info!(events = replay.len(), speedup, "replaying track log");
                (Box::new(replay), None)
            }
            None => {
                let secs = match args.first() {
                    Some(s) => s.parse::<u64>().context("drive duration must be whole seconds")?,
                    None => DEFAULT_DRIVE_SECS,
                };
                info!(secs, "starting demo drive");
                (Box::new(DemoSensor::default()), Some(Duration::from_secs(secs)))
            }
        };

    let state = controller.state().clone();
    controller.start_trip();
    let handle = SamplingPipeline::activate(sensor, state.clone(), config.pipeline.clone());

    let deadline = limit.map(|d| tokio::time::Instant::now() + d);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = ticker.tick() => {
                println!("{}", view::speedometer(&state.snapshot(), Utc::now()));
                let expired = deadline.is_some_and(|d| tokio::time::Instant::now() >= d);
                if expired || !handle.is_running() {
                    break;
                }
            }
        }
    }

    handle.deactivate().await;

    match controller.stop_trip()? {
        Some(trip) => println!("Saved: {}", trip),
        None => println!("No trip was active."),
    }
    println!("{}", view::fuel(&controller.fuel_status()));
    Ok(())
}

fn calc(args: &[String]) -> Result<()> {
    let [amount, price, ..] = args else {
        bail!("usage: tripgauge calc <amount> <price_per_litre>");
    };
    match PetrolCalculator::litres_for(amount, price) {
        Some(litres) => println!("{:.2} L", litres),
        None => bail!("amount must be a number and price a positive number"),
    }
    Ok(())
}

/// Write a simulated track log usable with TRIPGAUGE_TRACK
fn record(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("usage: tripgauge record <out.csv> [fixes]");
    };
    let fixes = match args.get(1) {
        Some(n) => n.parse::<usize>().context("fix count must be a whole number")?,
        None => DEFAULT_RECORD_FIXES,
    };

    let route = DemoRoute::default();
    let interval = route.interval;
    let mut drive = DemoDrive::new(route);
    let start = Utc::now();
    let samples: Vec<LocationSample> = (0..fixes)
        .map(|i| {
            let offset = chrono::Duration::from_std(interval * i as u32).unwrap_or_default();
            drive.step(interval, true, start + offset)
        })
        .collect();

    write_track_csv(path, &samples).with_context(|| format!("writing {}", path))?;
    println!("Wrote {} fixes to {}", samples.len(), path);
    Ok(())
}
