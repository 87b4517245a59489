//! Usage metrics
//!
//! The coordinator only writes to a [`MetricsSink`]. [`MetricsCollector`] is the in-process
//! sink: atomic counters for the hot paths, mutex-protected maps for per-handler and
//! per-phase timing buffers. Every buffer keeps at most [`MAX_SAMPLES`] entries.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Upper bound for every sample buffer
pub const MAX_SAMPLES: usize = 1000;

/// Pipeline phases with a measured duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Extraction,
    Delegation,
    Response,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Extraction => "extraction",
            Phase::Delegation => "delegation",
            Phase::Response => "response",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    CommandReceived,
    CommandRejected { reason: String },
    Delegated { handler_id: String, direct: bool },
    DispatchHit { handler_id: String, command_type: String },
    /// `reason` is the rendered dispatch-miss error
    DispatchMiss {
        handler_id: String,
        command_type: String,
        reason: String,
    },
    PhaseCompleted { phase: Phase, duration: Duration },
    ErrorRecovered { handler_id: String, message: String },
    CommandCompleted { handler_id: String, duration: Duration },
}

/// Write-only metrics destination
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _event: MetricEvent) {}
}

#[derive(Debug, Default)]
struct HandlerStats {
    commands: u64,
    dispatch_hits: u64,
    dispatch_misses: u64,
    recovered_errors: u64,
    response_times: VecDeque<u64>, // milliseconds
    last_command: u64,
}

/// Thread-safe in-process metrics sink
pub struct MetricsCollector {
    commands_received: AtomicU64,
    commands_completed: AtomicU64,
    commands_rejected: AtomicU64,
    direct_delegations: AtomicU64,
    generative_delegations: AtomicU64,
    dispatch_hits: AtomicU64,
    dispatch_misses: AtomicU64,
    recovered_errors: AtomicU64,
    started_at: u64,

    phase_times: Mutex<HashMap<Phase, VecDeque<u64>>>,
    handler_stats: Mutex<HashMap<String, HandlerStats>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            commands_received: AtomicU64::new(0),
            commands_completed: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            direct_delegations: AtomicU64::new(0),
            generative_delegations: AtomicU64::new(0),
            dispatch_hits: AtomicU64::new(0),
            dispatch_misses: AtomicU64::new(0),
            recovered_errors: AtomicU64::new(0),
            started_at: current_timestamp(),
            phase_times: Mutex::new(HashMap::new()),
            handler_stats: Mutex::new(HashMap::new()),
        }
    }

    fn push_bounded(buffer: &mut VecDeque<u64>, value: u64) {
        buffer.push_back(value);
        while buffer.len() > MAX_SAMPLES {
            buffer.pop_front();
        }
    }

    fn with_handler<F: FnOnce(&mut HandlerStats)>(&self, handler_id: &str, f: F) {
        if let Ok(mut stats) = self.handler_stats.lock() {
            f(stats.entry(handler_id.to_string()).or_default());
        }
    }

    fn record_phase(&self, phase: Phase, duration: Duration) {
        if let Ok(mut phases) = self.phase_times.lock() {
            Self::push_bounded(phases.entry(phase).or_default(), duration.as_millis() as u64);
        }
    }

    /// Summarize a buffer of millisecond samples (pure function)
    fn summarize(samples: &VecDeque<u64>) -> TimingSummary {
        if samples.is_empty() {
            return TimingSummary::default();
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();

        TimingSummary {
            count: sorted.len() as u64,
            avg_ms: sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
        }
    }

    /// Point-in-time copy of every counter and summary
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = current_timestamp();

        let phases = self
            .phase_times
            .lock()
            .map(|phases| {
                phases
                    .iter()
                    .map(|(phase, samples)| (phase.to_string(), Self::summarize(samples)))
                    .collect()
            })
            .unwrap_or_default();

        let handlers = self
            .handler_stats
            .lock()
            .map(|stats| {
                stats
                    .iter()
                    .map(|(id, s)| {
                        (
                            id.clone(),
                            HandlerStatsSnapshot {
                                commands: s.commands,
                                dispatch_hits: s.dispatch_hits,
                                dispatch_misses: s.dispatch_misses,
                                recovered_errors: s.recovered_errors,
                                response: Self::summarize(&s.response_times),
                                last_command: s.last_command,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            commands: CommandMetrics {
                received: self.commands_received.load(Ordering::Relaxed),
                completed: self.commands_completed.load(Ordering::Relaxed),
                rejected: self.commands_rejected.load(Ordering::Relaxed),
            },
            delegation: DelegationMetrics {
                direct: self.direct_delegations.load(Ordering::Relaxed),
                generative: self.generative_delegations.load(Ordering::Relaxed),
            },
            dispatch: DispatchMetrics {
                hits: self.dispatch_hits.load(Ordering::Relaxed),
                misses: self.dispatch_misses.load(Ordering::Relaxed),
            },
            recovered_errors: self.recovered_errors.load(Ordering::Relaxed),
            phases,
            handlers,
            uptime_seconds: now.saturating_sub(self.started_at),
            timestamp: now,
        }
    }

    /// Clear every counter and buffer
    pub fn reset(&self) {
        for counter in [
            &self.commands_received,
            &self.commands_completed,
            &self.commands_rejected,
            &self.direct_delegations,
            &self.generative_delegations,
            &self.dispatch_hits,
            &self.dispatch_misses,
            &self.recovered_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut phases) = self.phase_times.lock() {
            phases.clear();
        }
        if let Ok(mut stats) = self.handler_stats.lock() {
            stats.clear();
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for MetricsCollector {
    fn record(&self, event: MetricEvent) {
        match event {
            MetricEvent::CommandReceived => {
                self.commands_received.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::CommandRejected { .. } => {
                self.commands_rejected.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::Delegated { direct, .. } => {
                let counter = if direct {
                    &self.direct_delegations
                } else {
                    &self.generative_delegations
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::DispatchHit { handler_id, .. } => {
                self.dispatch_hits.fetch_add(1, Ordering::Relaxed);
                self.with_handler(&handler_id, |s| s.dispatch_hits += 1);
            }
            MetricEvent::DispatchMiss { handler_id, .. } => {
                self.dispatch_misses.fetch_add(1, Ordering::Relaxed);
                self.with_handler(&handler_id, |s| s.dispatch_misses += 1);
            }
            MetricEvent::PhaseCompleted { phase, duration } => {
                self.record_phase(phase, duration);
            }
            MetricEvent::ErrorRecovered { handler_id, .. } => {
                self.recovered_errors.fetch_add(1, Ordering::Relaxed);
                self.with_handler(&handler_id, |s| s.recovered_errors += 1);
            }
            MetricEvent::CommandCompleted {
                handler_id,
                duration,
            } => {
                self.commands_completed.fetch_add(1, Ordering::Relaxed);
                self.with_handler(&handler_id, |s| {
                    s.commands += 1;
                    s.last_command = current_timestamp();
                    Self::push_bounded(&mut s.response_times, duration.as_millis() as u64);
                });
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub commands: CommandMetrics,
    pub delegation: DelegationMetrics,
    pub dispatch: DispatchMetrics,
    pub recovered_errors: u64,
    pub phases: HashMap<String, TimingSummary>,
    pub handlers: HashMap<String, HandlerStatsSnapshot>,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandMetrics {
    pub received: u64,
    pub completed: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelegationMetrics {
    pub direct: u64,
    pub generative: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchMetrics {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingSummary {
    pub count: u64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandlerStatsSnapshot {
    pub commands: u64,
    pub dispatch_hits: u64,
    pub dispatch_misses: u64,
    pub recovered_errors: u64,
    pub response: TimingSummary,
    pub last_command: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;
    lower + (upper - lower) * index.fract()
}
