//! Fixed-interval detection polling.
//!
//! One task owns the timer and runs ticks inline, so ticks never overlap. A
//! tick that overruns the interval defers the next one until it completes
//! (`MissedTickBehavior::Delay`); missed ticks are not replayed in a burst.
//!
//! Every start and stop bumps a generation counter while holding the engine
//! write lock. A tick re-checks it inside the write that applies its result,
//! so nothing is applied once the run that issued it has been stopped.

use crate::capture::FrameSource;
use crate::detection::{DetectionClient, check_alignment};
use crate::error::AppError;
use crate::history::time_label;
use crate::notify::{AlertSink, NotificationDebouncer};
use crate::state::{Engine, TickStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Applied {
        occupied_count: usize,
        illegal_count: usize,
        alerts: usize,
    },
    CaptureFailed,
    DetectionFailed,
    /// The run was stopped or restarted while this tick was in flight.
    Discarded,
}

enum Command {
    Reconfigure(Duration),
    Stop,
}

struct Runner {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

struct TickContext<S, D> {
    engine: Engine,
    source: Arc<S>,
    client: Arc<D>,
    sink: Arc<dyn AlertSink>,
    debouncer: NotificationDebouncer,
    generation: Arc<AtomicU64>,
}

impl<S, D> TickContext<S, D> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

pub struct PollingScheduler<S, D> {
    ctx: Arc<TickContext<S, D>>,
    interval: Duration,
    runner: Option<Runner>,
}

impl<S, D> PollingScheduler<S, D>
where
    S: FrameSource,
    D: DetectionClient,
{
    pub fn new(
        engine: Engine,
        source: Arc<S>,
        client: Arc<D>,
        sink: Arc<dyn AlertSink>,
        interval_ms: u64,
    ) -> Self {
        Self {
            ctx: Arc::new(TickContext {
                engine,
                source,
                client,
                sink,
                debouncer: NotificationDebouncer::new(),
                generation: Arc::new(AtomicU64::new(0)),
            }),
            interval: Duration::from_millis(interval_ms.max(1)),
            runner: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.ctx.engine
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Detection needs an attached capture source and at least one zone.
    pub fn ensure_ready(&self) -> Result<(), AppError> {
        if !self.ctx.source.is_ready() {
            return Err(AppError::Precondition(
                "capture source is not available".to_string(),
            ));
        }
        if self.ctx.engine.read(|state| state.zone_count())? == 0 {
            return Err(AppError::Precondition(
                "draw at least one zone first".to_string(),
            ));
        }
        Ok(())
    }

    /// Start polling every `interval_ms`, running the first tick right away.
    /// Any previous run is cancelled first. Callers check [`Self::ensure_ready`].
    pub fn start(&mut self, interval_ms: u64) -> Result<(), AppError> {
        validate_interval(interval_ms)?;
        self.cancel_runner();

        let interval = Duration::from_millis(interval_ms);
        self.interval = interval;
        let counter = &self.ctx.generation;
        let generation = self.ctx.engine.write(|state| {
            state.set_interval_ms(interval_ms)?;
            let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;
            state.begin_detection(SystemTime::now());
            Ok::<_, AppError>(generation)
        })??;

        let (commands, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.ctx),
            generation,
            interval,
            receiver,
        ));
        self.runner = Some(Runner { commands, handle });
        info!(interval_ms, "Detection started");
        Ok(())
    }

    /// Cancel the timer. A detection call still in flight completes but its
    /// result is dropped.
    pub fn stop(&mut self) -> Result<(), AppError> {
        if !self.cancel_runner() {
            debug!("Stop requested while idle");
            return Ok(());
        }
        let counter = &self.ctx.generation;
        self.ctx.engine.write(|state| {
            counter.fetch_add(1, Ordering::SeqCst);
            state.end_detection();
        })?;
        info!("Detection stopped");
        Ok(())
    }

    /// Change the polling period. While running the timer is replaced in place
    /// and no extra tick is run; while idle the value is kept for the next start.
    pub fn reconfigure_interval(&mut self, interval_ms: u64) -> Result<(), AppError> {
        validate_interval(interval_ms)?;
        let interval = Duration::from_millis(interval_ms);
        self.interval = interval;
        self.ctx
            .engine
            .write(|state| state.set_interval_ms(interval_ms))??;

        if let Some(runner) = &self.runner
            && runner.commands.send(Command::Reconfigure(interval)).is_err()
        {
            warn!("Polling task is gone; interval applies on next start");
        }
        info!(interval_ms, running = self.is_running(), "Detection interval updated");
        Ok(())
    }

    fn cancel_runner(&mut self) -> bool {
        let Some(runner) = self.runner.take() else {
            return false;
        };
        let _ = runner.commands.send(Command::Stop);
        drop(runner.handle);
        true
    }
}

impl<S, D> Drop for PollingScheduler<S, D> {
    fn drop(&mut self) {
        if let Some(runner) = self.runner.take() {
            self.ctx.generation.fetch_add(1, Ordering::SeqCst);
            let _ = runner.commands.send(Command::Stop);
        }
    }
}

fn validate_interval(interval_ms: u64) -> Result<(), AppError> {
    if interval_ms == 0 {
        return Err(AppError::InvalidSetting(
            "interval_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

async fn run_loop<S, D>(
    ctx: Arc<TickContext<S, D>>,
    generation: u64,
    interval: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
) where
    S: FrameSource,
    D: DetectionClient,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(Command::Reconfigure(period)) => {
                    ticker = tokio::time::interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    debug!(interval_ms = period.as_millis(), "Polling timer replaced");
                }
                Some(Command::Stop) | None => break,
            },
            _ = ticker.tick() => {
                if !ctx.is_current(generation) {
                    break;
                }
                match run_tick(&ctx, generation).await {
                    Ok(outcome) => debug!(?outcome, "Tick finished"),
                    Err(err) => error!(error = %err, "Tick aborted"),
                }
            }
        }
    }
    debug!(generation, "Polling loop exited");
}

async fn run_tick<S, D>(ctx: &TickContext<S, D>, generation: u64) -> Result<TickOutcome, AppError>
where
    S: FrameSource,
    D: DetectionClient,
{
    let _gate = ctx.engine.lock_tick().await;
    if !ctx.is_current(generation) {
        return Ok(TickOutcome::Discarded);
    }

    let frame = match ctx.source.capture().await {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "Frame capture failed, skipping tick");
            let status = TickStatus::CaptureFailed {
                reason: err.to_string(),
            };
            return record_failure(ctx, generation, status, TickOutcome::CaptureFailed);
        }
    };

    let zones = ctx.engine.read(|state| state.zones().to_vec())?;
    let started = Instant::now();
    let result = ctx.client.detect(&frame, &zones).await;

    let result = match result {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "Detection error, retrying on next tick");
            let status = TickStatus::DetectionFailed {
                reason: err.to_string(),
            };
            return record_failure(ctx, generation, status, TickOutcome::DetectionFailed);
        }
    };

    if let Err(err) = check_alignment(&result, &zones) {
        warn!(error = %err, "Detection result does not match zone set, skipping tick");
        let status = TickStatus::DetectionFailed {
            reason: err.to_string(),
        };
        return record_failure(ctx, generation, status, TickOutcome::DetectionFailed);
    }

    let detection_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let vehicle_count = result.detections.len();
    let now = SystemTime::now();

    // Start and stop bump the generation under this same lock, so the check
    // and the whole apply are atomic with respect to them.
    let applied = ctx.engine.write(|state| {
        if !ctx.is_current(generation) {
            return None;
        }
        let reconciliation =
            state.apply_detection(result.detections, &result.per_zone_occupied, now);
        let label = time_label(now, state.label_offset());
        state.record_history(vehicle_count, reconciliation.illegal_count, label);
        state.mark_tick_ok(detection_ms);
        state.publish_frame();
        Some(reconciliation)
    })?;
    let Some(reconciliation) = applied else {
        info!("Detection stopped while request was in flight, discarding result");
        return Ok(TickOutcome::Discarded);
    };

    let alerts = ctx
        .debouncer
        .dispatch(&reconciliation.events, ctx.sink.as_ref());

    debug!(
        vehicles = vehicle_count,
        occupied = reconciliation.occupied_count,
        illegal = reconciliation.illegal_count,
        detection_ms,
        "Tick applied"
    );

    Ok(TickOutcome::Applied {
        occupied_count: reconciliation.occupied_count,
        illegal_count: reconciliation.illegal_count,
        alerts,
    })
}

/// Count a failed tick unless the run has moved on in the meantime.
fn record_failure<S, D>(
    ctx: &TickContext<S, D>,
    generation: u64,
    status: TickStatus,
    outcome: TickOutcome,
) -> Result<TickOutcome, AppError> {
    let marked = ctx.engine.write(|state| {
        if !ctx.is_current(generation) {
            return false;
        }
        state.mark_tick_failed(status);
        true
    })?;
    Ok(if marked { outcome } else { TickOutcome::Discarded })
}
