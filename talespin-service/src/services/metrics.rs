//! Prometheus metrics for talespin-service.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static STORIES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GENERATION_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static SESSIONS_ACTIVE: OnceLock<IntGauge> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    // path: new | continuation, source: generated | fallback
    let stories_total = IntCounterVec::new(
        Opts::new("talespin_stories_total", "Total stories produced"),
        &["style", "path", "source"],
    )?;

    let generation_latency = HistogramVec::new(
        HistogramOpts::new(
            "talespin_generation_latency_seconds",
            "Text provider latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0]),
        &["outcome"],
    )?;

    let sessions_active = IntGauge::new("talespin_sessions_active", "Sessions currently held")?;

    registry.register(Box::new(stories_total.clone()))?;
    registry.register(Box::new(generation_latency.clone()))?;
    registry.register(Box::new(sessions_active.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = STORIES_TOTAL.set(stories_total);
    let _ = GENERATION_LATENCY_SECONDS.set(generation_latency);
    let _ = SESSIONS_ACTIVE.set(sessions_active);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => return "# Metrics registry not initialized\n".to_string(),
    };

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
        format!("# Failed to convert metrics to UTF-8: {}\n", e)
    })
}

/// Record a produced story.
pub fn record_story(style: &str, continuation: bool, generated: bool) {
    if let Some(counter) = STORIES_TOTAL.get() {
        let path = if continuation { "continuation" } else { "new" };
        let source = if generated { "generated" } else { "fallback" };
        counter.with_label_values(&[style, path, source]).inc();
    }
}

/// Record one provider call.
pub fn observe_generation(outcome: &str, elapsed: Duration) {
    if let Some(histogram) = GENERATION_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[outcome])
            .observe(elapsed.as_secs_f64());
    }
}

pub fn set_sessions_active(count: usize) {
    if let Some(gauge) = SESSIONS_ACTIVE.get() {
        gauge.set(count as i64);
    }
}
