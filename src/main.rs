// src/main.rs

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use greenwave::config::Config;
use greenwave::counter;
use greenwave::counts::LaneCountStore;
use greenwave::metrics::ControllerMetrics;
use greenwave::scheduler::{CycleScheduler, TickOutcome};
use greenwave::types::Lane;

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("🚦 Adaptive Intersection Controller Starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Detection: line_y={} band=±{}px min_blob={}x{} threshold={}",
        config.detection.line_y,
        config.detection.line_band_px,
        config.detection.min_blob_width,
        config.detection.min_blob_height,
        config.detection.diff_threshold
    );
    info!(
        "Control: interval={:.1}s passage_ratio={:.2} fallback={:.1}s",
        config.control.decision_interval_s,
        config.control.passage_ratio,
        config.control.fallback_duration_s
    );

    let store = LaneCountStore::new();
    let metrics = ControllerMetrics::new();
    let cancel = Arc::new(AtomicBool::new(false));

    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::Relaxed);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    // ── Lane workers ─────────────────────────────────────────────────────
    let mut workers: Vec<(Lane, JoinHandle<u32>)> = Vec::new();
    for source in &config.video.sources {
        let lane = source.lane;
        let path = PathBuf::from(&source.path);
        let detection = config.detection.clone();
        let fps = config.video.source_fps;
        let store = store.clone();
        let metrics = metrics.clone();
        let cancel = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name(format!("counter-{}", lane))
            .spawn(move || counter::run_lane(lane, &path, &detection, fps, store, metrics, cancel))
            .with_context(|| format!("failed to spawn worker for lane {}", lane))?;
        workers.push((lane, handle));
    }
    if workers.is_empty() {
        warn!("no video sources configured, all lanes will stay at zero");
    } else {
        info!("🚗 {} lane worker(s) started", workers.len());
    }

    // ── Decision loop ────────────────────────────────────────────────────
    let mut scheduler = CycleScheduler::new(store.clone(), &config.control);
    let interval = Duration::from_secs_f64(config.control.decision_interval_s);

    let mut decisions_file = if config.output.write_decisions {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&config.output.decisions_path)
            .with_context(|| {
                format!(
                    "failed to open decisions file '{}'",
                    config.output.decisions_path
                )
            })?;
        info!("💾 Decisions will be appended to {}", config.output.decisions_path);
        Some(file)
    } else {
        None
    };

    loop {
        if !wait_for_interval(&cancel, interval) {
            info!("shutdown requested, stopping decision loop");
            break;
        }

        let outcome = scheduler.tick(None);
        metrics.inc(&metrics.ticks_executed);
        if outcome.fallback_used {
            metrics.inc(&metrics.fallback_durations);
            warn!(
                "tick {}: no rule fired for lane {}, using fallback duration",
                outcome.tick, outcome.priority_lane
            );
        }
        info!(
            "🚦 tick {}: lane {} green for {:.1}s | plan: {}",
            outcome.tick,
            outcome.priority_lane,
            outcome.priority_duration_s,
            format_plan(&outcome)
        );

        if let Some(file) = decisions_file.as_mut() {
            let line = serde_json::to_string(&outcome)?;
            writeln!(file, "{}", line)?;
            file.flush()?;
        }

        if config.control.max_ticks > 0 && scheduler.ticks() >= config.control.max_ticks {
            info!("reached {} tick(s), stopping", config.control.max_ticks);
            break;
        }
        if !workers.is_empty() && workers.iter().all(|(_, handle)| handle.is_finished()) {
            info!("all lane streams ended, stopping");
            break;
        }
    }

    // ── Shutdown ─────────────────────────────────────────────────────────
    cancel.store(true, Ordering::Relaxed);
    for (lane, handle) in workers {
        match handle.join() {
            Ok(count) => info!("lane {}: final count {}", lane, count),
            Err(_) => error!("lane {}: worker panicked", lane),
        }
    }

    let summary = metrics.summary();
    info!(
        "📊 Done: {} tick(s), {} vehicle(s) across {} frame(s) ({:.1} fps), {} fallback(s), {} failed stream(s)",
        summary.ticks_executed,
        summary.vehicles_counted,
        summary.frames_processed,
        summary.fps,
        summary.fallback_durations,
        summary.streams_failed
    );

    Ok(())
}

fn format_plan(outcome: &TickOutcome) -> String {
    outcome
        .durations_s
        .iter()
        .map(|(lane, secs)| format!("{}={:.1}s", lane, secs))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sleep in short slices so cancellation is honored mid-interval.
/// Returns false when cancellation was raised during the wait.
fn wait_for_interval(cancel: &AtomicBool, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}
