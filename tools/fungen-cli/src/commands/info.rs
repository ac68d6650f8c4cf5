//! Show funscript statistics.

use std::path::PathBuf;

use fungen_signal_model::Funscript;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let script =
        Funscript::load(&path).map_err(|e| anyhow::anyhow!("Failed to load funscript: {e}"))?;
    let g = &script.generator;
    let stats = script.stats();

    println!("Funscript: {}", path.display());
    println!("  Version: {}", script.version);
    println!("  Inverted: {}", script.inverted);
    println!("  Range: {}", script.range);
    println!();

    println!("Generator:");
    println!("  {} {}", g.name, g.version);
    if !g.source.is_empty() {
        println!("  Source: {}", g.source);
    }
    if !g.model.is_empty() {
        println!("  Model: {}", g.model);
    }
    if let Some(ref fp) = g.fingerprint {
        println!("  Fingerprint: {fp}");
    }
    println!("  Frame rate: {} fps", g.frame_rate);
    println!();

    println!("Actions:");
    println!("  Count: {}", stats.total_actions);
    println!("  Duration: {:.1}s", stats.duration_ms as f64 / 1000.0);
    println!("  Actions per second: {:.2}", stats.actions_per_second);
    println!("  Mean interval: {:.0}ms", stats.avg_interval_ms);
    println!("  Mean position change: {:.1}", stats.avg_position_change);
    println!(
        "  Extreme positions: {:.0}%",
        stats.extreme_positions_ratio * 100.0
    );
    println!(
        "  Centre positions: {:.0}%",
        stats.center_positions_ratio * 100.0
    );

    Ok(())
}
