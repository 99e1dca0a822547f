use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::catalog::TileCatalog;
use crate::config::simulation::SimulationConfig;
use crate::persistence::{FileStore, StateStore, ALL_KEYS};
use crate::simulation::City;
use crate::simulation::advisory::WarningLevel;

/// Wall-clock milliseconds; event and notice timestamps survive restarts.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

pub fn load_catalog(config: &SimulationConfig) -> Result<TileCatalog, String> {
    match &config.catalog_path {
        Some(path) => TileCatalog::from_file(path),
        None => Ok(TileCatalog::builtin()),
    }
}

fn open_city(config: &SimulationConfig) -> Result<(City, FileStore), String> {
    let catalog = load_catalog(config)?;
    let store = FileStore::new(&config.save_directory);
    let city = City::load(config.clone(), catalog, &store);
    Ok((city, store))
}

fn save_city(city: &City, store: &mut FileStore) -> Result<(), String> {
    city.save(store)
        .map_err(|e| format!("Failed to save state to {}: {}", store.dir().display(), e))
}

/// Run the simulation loop until ctrl-c or `max_ticks` ticks.
pub async fn run_simulation(config: &SimulationConfig, max_ticks: Option<u64>) -> Result<(), String> {
    let (mut city, mut store) = open_city(config)?;
    info!(
        side = city.map().grid().side(),
        carbon = city.ledger().carbon(),
        day = city.clock().current_day(),
        "City loaded"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interval = tokio::time::interval(Duration::from_millis(config.tick_interval_ms.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    city.start(now_ms());
    info!(
        tick_interval_ms = config.tick_interval_ms,
        autosave_interval_ms = config.autosave_interval_ms,
        "Simulation running"
    );

    let mut ticks: u64 = 0;
    let mut last_save_ms = now_ms();
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }

        let now = now_ms();
        let result = city.tick(now);
        ticks += 1;

        if let Some(day) = result.new_day {
            info!(
                day,
                carbon = city.ledger().carbon(),
                biodiversity = city.ledger().biodiversity(),
                culture = city.ledger().culture(),
                score = city.ledger().total_score(),
                "Day started"
            );
        }
        if !result.grown.is_empty() {
            info!(cells = result.grown.len(), "Crops ripened");
        }
        if result.advisory_refreshed && city.advisory().report().has_critical_warnings() {
            for warning in city.advisory().report().warnings_at(WarningLevel::Critical) {
                warn!(kind = %warning.kind, message = %warning.message, "Critical advisory");
            }
        }

        if now.saturating_sub(last_save_ms) >= config.autosave_interval_ms {
            match save_city(&city, &mut store) {
                Ok(()) => last_save_ms = now,
                Err(e) => warn!(error = %e, "Autosave failed"),
            }
        }

        if max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
    }

    city.stop();
    save_city(&city, &mut store)?;
    info!(ticks, day = city.clock().current_day(), "Simulation stopped");
    Ok(())
}

/// Print a summary of the saved city.
pub fn inspect(config: &SimulationConfig) -> Result<(), String> {
    let (city, store) = open_city(config)?;
    let stored: Vec<&str> = ALL_KEYS
        .iter()
        .copied()
        .filter(|key| matches!(store.load(key), Ok(Some(_))))
        .collect();

    let ledger = city.ledger();
    let map = city.map();
    println!("=== City ({}) ===", store.dir().display());
    println!("Saved keys: {}", if stored.is_empty() { "(none)".to_string() } else { stored.join(", ") });
    println!(
        "Day {} at {} (speed x{})",
        city.clock().current_day(),
        city.clock().time_of_day(),
        city.clock().speed()
    );
    println!("Grid: {}x{} (multiplier {})", map.grid().side(), map.grid().side(), map.multiplier());
    println!();
    println!("--- Resources ---");
    println!("  Carbon: {}", ledger.carbon());
    println!("  Biodiversity: {}", ledger.biodiversity());
    println!("  Culture: {}", ledger.culture());
    println!("  Score: {}", ledger.total_score());
    println!();

    println!("--- Tiles ---");
    let total = (map.grid().side() * map.grid().side()) as f64;
    let mut counts: Vec<_> = map
        .catalog()
        .iter()
        .map(|def| (def, map.count_tiles(def.id)))
        .filter(|(_, count)| *count > 0)
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    for (def, count) in &counts {
        println!("  {:<20} {:>5} ({:.1}%)", def.name, count, *count as f64 / total * 100.0);
    }
    println!();

    println!("--- Events ---");
    let active = city.events().active_events();
    if active.is_empty() {
        println!("  (none active)");
    }
    for event in active {
        let marker = if event.awaiting_response() { " [response needed]" } else { "" };
        println!("  #{} {} {}{}", event.id, event.icon, event.name, marker);
    }
    println!("  {} in history", city.events().history().count());
    println!();

    println!("--- Notices ---");
    for notice in city.notices().active() {
        println!("  [{:?}] {}: {}", notice.kind, notice.title, notice.message);
    }
    println!("  {} unhandled", city.notices().unhandled_count());
    Ok(())
}

pub fn export(config: &SimulationConfig, output: &Path) -> Result<(), String> {
    let (city, _) = open_city(config)?;
    let json = city
        .export_map()
        .map_err(|e| format!("Failed to export map: {}", e))?;
    fs::write(output, json).map_err(|e| format!("Cannot write {}: {}", output.display(), e))?;
    println!("Map exported to {}", output.display());
    Ok(())
}

pub fn import(config: &SimulationConfig, input: &Path) -> Result<(), String> {
    let (mut city, mut store) = open_city(config)?;
    let data = fs::read_to_string(input).map_err(|e| format!("Cannot read {}: {}", input.display(), e))?;
    city.import_map(&data)
        .map_err(|e| format!("Failed to import {}: {}", input.display(), e))?;
    save_city(&city, &mut store)?;
    println!(
        "Imported {}x{} map from {}",
        city.map().grid().side(),
        city.map().grid().side(),
        input.display()
    );
    Ok(())
}

pub fn resize(config: &SimulationConfig, multiplier: u32) -> Result<(), String> {
    let (mut city, mut store) = open_city(config)?;
    if !city.set_canvas_size_multiplier(multiplier) {
        println!("Map already at multiplier {}", city.map().multiplier());
        return Ok(());
    }
    save_city(&city, &mut store)?;
    println!(
        "Map resized to {}x{} (multiplier {})",
        city.map().grid().side(),
        city.map().grid().side(),
        city.map().multiplier()
    );
    Ok(())
}

pub fn layout(config: &SimulationConfig) -> Result<(), String> {
    let (mut city, mut store) = open_city(config)?;
    city.import_default_layout()
        .map_err(|e| format!("Failed to apply default layout: {}", e))?;
    save_city(&city, &mut store)?;
    println!("Default layout applied at multiplier {}", city.map().multiplier());
    Ok(())
}

/// Buy a tile at (x, y), charging its price in carbon.
pub fn place(config: &SimulationConfig, x: usize, y: usize, tile_id: u32, variant: i32) -> Result<(), String> {
    let (mut city, mut store) = open_city(config)?;
    let placed = city
        .purchase_tile(x, y, tile_id, variant)
        .map_err(|e| e.to_string())?;
    if !placed {
        let side = city.map().grid().side();
        return Err(format!("({}, {}) is outside the {}x{} grid", x, y, side, side));
    }
    save_city(&city, &mut store)?;
    println!("Placed tile {} at ({}, {}); carbon now {}", tile_id, x, y, city.ledger().carbon());
    Ok(())
}

pub fn respond(config: &SimulationConfig, event_id: u64, option: Option<usize>) -> Result<(), String> {
    let (mut city, mut store) = open_city(config)?;
    let now = now_ms();
    let chosen = match option {
        Some(index) => city
            .respond_to_event(event_id, index, now)
            .map_err(|e| e.to_string())?,
        None => city
            .auto_respond(event_id, now)
            .ok_or_else(|| format!("Event {} has no response to choose", event_id))?,
    };
    save_city(&city, &mut store)?;
    println!("Responded to event {}: {}", event_id, chosen.text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> SimulationConfig {
        SimulationConfig {
            save_directory: dir.path().to_string_lossy().into_owned(),
            seed: 7,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn place_persists_between_commands() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        place(&config, 2, 3, 8, 0).unwrap();

        let (city, _) = open_city(&config).unwrap();
        assert_eq!(city.map().cell(2, 3).unwrap().tile_id(), 8);
        assert_eq!(city.ledger().carbon(), 880);
    }

    #[test]
    fn place_outside_grid_fails() {
        let dir = TempDir::new().unwrap();
        assert!(place(&config(&dir), 70, 0, 1, 0).is_err());
    }

    #[test]
    fn export_then_import_restores_grid() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        place(&config, 0, 0, 10, 0).unwrap();
        let file = dir.path().join("map.json");
        export(&config, &file).unwrap();

        resize(&config, 2).unwrap();
        import(&config, &file).unwrap();
        let (city, _) = open_city(&config).unwrap();
        assert_eq!(city.map().multiplier(), 1);
        assert_eq!(city.map().cell(0, 0).unwrap().tile_id(), 10);
    }

    #[tokio::test]
    async fn bounded_run_saves_state() {
        let dir = TempDir::new().unwrap();
        let config = SimulationConfig {
            tick_interval_ms: 1,
            ..config(&dir)
        };
        run_simulation(&config, Some(3)).await.unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.keys().unwrap().len(), ALL_KEYS.len());
    }
}
