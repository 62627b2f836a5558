//! Live session
//!
//! Runs the two independent paths of the system as tokio tasks:
//! - Ingestion: samples, history, electrode readings and band frames arrive
//!   on a bounded channel; the temporal path is evaluated on every sample and
//!   on a fixed cadence so stale windows decay.
//! - Fusion: redraws the mesh at a fixed tick rate from a snapshot of the
//!   electrode table, independent of data arrival.
//!
//! Both tasks stop on [`SessionHandle::stop`], which joins them before
//! returning.

use crate::acquisition::Acquisition;
use crate::config::FluxConfig;
use crate::electrode::{ElectrodeSource, ElectrodeTable};
use crate::error::ComputeError;
use crate::fusion::{FrameStats, FusionEngine, Mesh};
use crate::fusion::render::{Frame, RenderTarget};
use crate::pipeline::StressProcessor;
use crate::schema::{FluxRecord, RawBandFrame};
use crate::types::{ElectrodeReading, LevelChange, Sample, StressStatus};
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Source of the current time in ms since the epoch
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock moved by hand; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Input accepted by the ingestion task
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Sample(Sample),
    /// Historical batch, ordered before ingestion
    History(Vec<Sample>),
    Electrode(ElectrodeReading),
    Bands(RawBandFrame),
    /// Undecoded record; untimed rows are stamped with the session clock
    Record(FluxRecord),
}

enum Control {
    AttachMesh(Mesh),
}

/// Entry point for live sessions
pub struct Session;

impl Session {
    /// Validate `config` and spawn the ingestion and fusion tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T>(
        config: FluxConfig,
        mesh: Option<Mesh>,
        target: T,
        clock: Arc<dyn Clock>,
    ) -> Result<SessionHandle, ComputeError>
    where
        T: RenderTarget + 'static,
    {
        config.validate()?;

        let id = Uuid::new_v4();
        let started_at = clock.now_ms();
        let electrodes = ElectrodeTable::new(config.fusion.electrodes.iter().map(|e| e.name.as_str()));

        let (events_tx, events_rx) = mpsc::channel(config.session.channel_capacity.max(1));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let processor = StressProcessor::new(&config, started_at);
        let (status_tx, status_rx) = watch::channel(processor.status());
        let (frame_tx, frame_rx) = watch::channel(None);

        let mut engine = FusionEngine::new(&config.fusion);
        if let Some(mesh) = mesh {
            engine.attach_mesh(mesh);
        }

        info!(
            session = %id,
            electrodes = electrodes.len(),
            has_mesh = engine.has_mesh(),
            "session started"
        );

        let ingestion = tokio::spawn(run_ingestion(IngestionTask {
            events: events_rx,
            stop: stop_rx.clone(),
            processor,
            acquisition: Acquisition::new(&config.acquisition, &config.scoring),
            electrodes: electrodes.clone(),
            clock: Arc::clone(&clock),
            status: status_tx,
            changes: changes_tx,
            evaluation_interval: Duration::from_millis(config.session.evaluation_interval_ms.max(1)),
        }));

        let fusion = tokio::spawn(run_fusion(FusionTask {
            engine,
            target,
            electrodes: electrodes.clone(),
            clock,
            control: control_rx,
            stop: stop_rx,
            frames: frame_tx,
            tick_interval: Duration::from_millis(config.fusion.tick_interval_ms.max(1)),
        }));

        Ok(SessionHandle {
            id,
            events: events_tx,
            control: control_tx,
            status: status_rx,
            frames: frame_rx,
            level_changes: Some(changes_rx),
            electrodes,
            stop: stop_tx,
            ingestion,
            fusion,
        })
    }
}

/// Handle to a running session
pub struct SessionHandle {
    id: Uuid,
    events: mpsc::Sender<IngestEvent>,
    control: mpsc::UnboundedSender<Control>,
    status: watch::Receiver<StressStatus>,
    frames: watch::Receiver<Option<FrameStats>>,
    level_changes: Option<mpsc::UnboundedReceiver<LevelChange>>,
    electrodes: ElectrodeTable,
    stop: watch::Sender<bool>,
    ingestion: JoinHandle<()>,
    fusion: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Sender for the ingestion channel
    pub fn sender(&self) -> mpsc::Sender<IngestEvent> {
        self.events.clone()
    }

    pub async fn ingest(&self, event: IngestEvent) -> Result<(), ComputeError> {
        self.events
            .send(event)
            .await
            .map_err(|_| ComputeError::SessionClosed("ingestion task has stopped".to_string()))
    }

    pub async fn ingest_history(&self, samples: Vec<Sample>) -> Result<(), ComputeError> {
        self.ingest(IngestEvent::History(samples)).await
    }

    /// Attach or replace the mesh; takes effect on the next tick
    pub fn attach_mesh(&self, mesh: Mesh) -> Result<(), ComputeError> {
        self.control
            .send(Control::AttachMesh(mesh))
            .map_err(|_| ComputeError::SessionClosed("fusion task has stopped".to_string()))
    }

    /// Latest evaluated status
    pub fn status(&self) -> StressStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every evaluation
    pub fn subscribe_status(&self) -> watch::Receiver<StressStatus> {
        self.status.clone()
    }

    /// Level change stream; available once
    pub fn level_changes(&mut self) -> Option<mpsc::UnboundedReceiver<LevelChange>> {
        self.level_changes.take()
    }

    /// Snapshot of every electrode source
    pub fn electrodes(&self) -> Vec<ElectrodeSource> {
        self.electrodes.snapshot()
    }

    /// Stats of the last frame delivered to the render target
    pub fn last_frame(&self) -> Option<FrameStats> {
        *self.frames.borrow()
    }

    /// Stop both tasks and wait for them to finish
    pub async fn stop(self) -> Result<(), ComputeError> {
        // send only fails once both tasks have already exited
        let _ = self.stop.send(true);

        let (ingestion, fusion) = tokio::join!(self.ingestion, self.fusion);
        ingestion.map_err(|e| ComputeError::SessionClosed(format!("ingestion task: {}", e)))?;
        fusion.map_err(|e| ComputeError::SessionClosed(format!("fusion task: {}", e)))?;

        info!(session = %self.id, "session stopped");
        Ok(())
    }
}

struct IngestionTask {
    events: mpsc::Receiver<IngestEvent>,
    stop: watch::Receiver<bool>,
    processor: StressProcessor,
    acquisition: Acquisition,
    electrodes: ElectrodeTable,
    clock: Arc<dyn Clock>,
    status: watch::Sender<StressStatus>,
    changes: mpsc::UnboundedSender<LevelChange>,
    evaluation_interval: Duration,
}

impl IngestionTask {
    fn handle(&mut self, event: IngestEvent) {
        let now = self.clock.now_ms();
        match event {
            IngestEvent::Sample(sample) => {
                self.processor.ingest(sample);
                self.evaluate(now);
            }
            IngestEvent::History(samples) => {
                self.processor.ingest_history(samples);
                self.evaluate(now);
            }
            IngestEvent::Electrode(reading) => {
                if !self.electrodes.apply(&reading) {
                    debug!(electrode = %reading.electrode, "stale electrode reading ignored");
                }
            }
            IngestEvent::Bands(frame) => {
                let output = self.acquisition.process(&frame, now);
                for reading in &output.readings {
                    self.electrodes.apply(reading);
                }
                if let Some(sample) = output.sample {
                    self.processor.ingest(sample);
                    self.evaluate(now);
                }
            }
            IngestEvent::Record(record) => {
                let event = match record {
                    FluxRecord::Sample(raw) => IngestEvent::Sample(raw.into_sample(now)),
                    FluxRecord::Electrode(raw) => IngestEvent::Electrode(raw.into_reading(now)),
                    FluxRecord::Bands(frame) => IngestEvent::Bands(frame),
                };
                self.handle(event);
            }
        }
    }

    fn evaluate(&mut self, now: i64) {
        let (status, change) = self.processor.evaluate(now);
        self.status.send_replace(status);
        if let Some(change) = change {
            // nobody listening is fine
            let _ = self.changes.send(change);
        }
    }
}

async fn run_ingestion(mut task: IngestionTask) {
    let mut ticker = tokio::time::interval(task.evaluation_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = task.stop.changed() => break,
            event = task.events.recv() => match event {
                Some(event) => task.handle(event),
                None => break,
            },
            _ = ticker.tick() => {
                let now = task.clock.now_ms();
                task.evaluate(now);
            }
        }
    }
    debug!("ingestion task exited");
}

struct FusionTask<T> {
    engine: FusionEngine,
    target: T,
    electrodes: ElectrodeTable,
    clock: Arc<dyn Clock>,
    control: mpsc::UnboundedReceiver<Control>,
    stop: watch::Receiver<bool>,
    frames: watch::Sender<Option<FrameStats>>,
    tick_interval: Duration,
}

impl<T: RenderTarget> FusionTask<T> {
    /// One redraw; `None` while no mesh is attached
    fn redraw(&mut self) -> Option<Result<(), String>> {
        let now = self.clock.now_ms();
        let sources = self.electrodes.snapshot();
        let stats = self.engine.tick(&sources, now)?;

        if !self.target.is_ready() {
            return Some(Err("render target not ready".to_string()));
        }
        let frame = Frame {
            tick: stats.tick,
            at_ms: now,
            intensities: self.engine.intensities(),
        };
        match self.target.push_frame(&frame) {
            Ok(()) => {
                self.frames.send_replace(Some(stats));
                Some(Ok(()))
            }
            Err(e) => Some(Err(e.to_string())),
        }
    }
}

async fn run_fusion<T: RenderTarget>(mut task: FusionTask<T>) {
    let mut ticker = tokio::time::interval(task.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut delivering = true;

    loop {
        tokio::select! {
            biased;
            _ = task.stop.changed() => break,
            Some(control) = task.control.recv() => match control {
                Control::AttachMesh(mesh) => {
                    info!(vertices = mesh.len(), "mesh attached");
                    task.engine.attach_mesh(mesh);
                }
            },
            _ = ticker.tick() => match task.redraw() {
                Some(Ok(())) if !delivering => {
                    info!("render target recovered");
                    delivering = true;
                }
                Some(Err(error)) if delivering => {
                    warn!(%error, "frame dropped; retrying next tick");
                    delivering = false;
                }
                _ => {}
            },
        }
    }
    debug!("fusion task exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElectrodePlacement;
    use crate::fusion::MemoryRenderTarget;
    use crate::types::StressLevel;
    use pretty_assertions::assert_eq;

    fn fast_config() -> FluxConfig {
        let mut config = FluxConfig::default();
        config.fusion.tick_interval_ms = 5;
        config.session.evaluation_interval_ms = 5;
        config
    }

    async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..400 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    fn tp9_mesh() -> Mesh {
        Mesh::new(vec![[65.0, -10.0, 0.0], [0.0, -80.0, 0.0]])
    }

    #[tokio::test]
    async fn test_sample_updates_status_and_emits_change() {
        let clock = ManualClock::new(10_000);
        let mut handle = Session::start(
            fast_config(),
            None,
            MemoryRenderTarget::new(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let mut changes = handle.level_changes().unwrap();
        assert!(handle.level_changes().is_none());

        handle
            .ingest(IngestEvent::Sample(Sample::new(10_000, 0.1, 0.6, 0.1, 3.0, 3.0)))
            .await
            .unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!((change.from, change.to), (StressLevel::Low, StressLevel::High));
        assert_eq!(change.at_ms, 10_000);
        assert!(wait_until(|| handle.status().level == StressLevel::High).await);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_window_decays_on_cadence() {
        let clock = ManualClock::new(0);
        let mut handle = Session::start(
            fast_config(),
            None,
            MemoryRenderTarget::new(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let mut changes = handle.level_changes().unwrap();

        handle
            .ingest(IngestEvent::Sample(Sample::new(0, 0.1, 0.6, 0.1, 3.0, 3.0)))
            .await
            .unwrap();
        assert_eq!(changes.recv().await.unwrap().to, StressLevel::High);

        // no new data: the window empties and the downgrade is due
        clock.set(20_000);
        let change = changes.recv().await.unwrap();
        assert_eq!(change.to, StressLevel::Low);
        assert_eq!(change.details.stress_intensity, 0.0);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_electrode_reading_paints_then_fades() {
        let clock = ManualClock::new(1_000);
        let target = MemoryRenderTarget::new();
        let handle = Session::start(
            fast_config(),
            Some(tp9_mesh()),
            target.clone(),
            Arc::new(clock.clone()),
        )
        .unwrap();

        handle
            .ingest(IngestEvent::Electrode(ElectrodeReading::new("TP9", 1.0, 1_000)))
            .await
            .unwrap();
        assert!(
            wait_until(|| target
                .last_frame()
                .map_or(false, |f| f.intensities[0] == 85.5))
            .await
        );
        let frame = target.last_frame().unwrap();
        assert_eq!(frame.intensities[1], 10.1);

        clock.set(9_000);
        assert!(
            wait_until(|| target
                .last_frame()
                .map_or(false, |f| f.intensities[0] == 20.0))
            .await
        );

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_target_skips_frames() {
        let target = MemoryRenderTarget::new();
        target.set_available(false);
        let handle = Session::start(
            fast_config(),
            Some(tp9_mesh()),
            target.clone(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(target.frame_count(), 0);
        assert!(handle.last_frame().is_none());

        target.set_available(true);
        assert!(wait_until(|| target.frame_count() > 0).await);
        assert!(wait_until(|| handle.last_frame().is_some()).await);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_mesh_attached_later() {
        let target = MemoryRenderTarget::new();
        let handle = Session::start(
            fast_config(),
            None,
            target.clone(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(target.frame_count(), 0);

        handle.attach_mesh(tp9_mesh()).unwrap();
        assert!(wait_until(|| target.frame_count() > 0).await);
        assert_eq!(target.last_frame().unwrap().intensities.len(), 2);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_band_frames_feed_both_paths() {
        let mut config = fast_config();
        config.fusion.electrodes = vec![
            ElectrodePlacement::new("TP9", [65.0, -10.0, 0.0]),
            ElectrodePlacement::new("TP10", [-65.0, -10.0, 0.0]),
        ];
        let handle = Session::start(
            config,
            None,
            MemoryRenderTarget::new(),
            Arc::new(ManualClock::new(5_000)),
        )
        .unwrap();

        let record = r#"{"kind":"bands","timestamp_ms":5000,"channels":[
            {"electrode":"TP9","delta":0.1,"theta":0.1,"alpha":0.1,"beta":0.5},
            {"electrode":"TP10","delta":0.1,"theta":0.1,"alpha":0.1,"beta":0.5}]}"#;
        let record: FluxRecord = serde_json::from_str(record).unwrap();
        handle.ingest(IngestEvent::Record(record)).await.unwrap();

        assert!(wait_until(|| handle.status().window_samples == 1).await);
        let sources = handle.electrodes();
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|s| s.last_update_ms == Some(5_000)));
        assert!(sources.iter().all(|s| (s.intensity - 0.9).abs() < 1e-9));

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_ends_writes() {
        let target = MemoryRenderTarget::new();
        let handle = Session::start(
            fast_config(),
            Some(tp9_mesh()),
            target.clone(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let sender = handle.sender();

        assert!(wait_until(|| target.frame_count() > 0).await);
        handle.stop().await.unwrap();

        let frames = target.frame_count();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(target.frame_count(), frames);
        assert!(sender
            .send(IngestEvent::Sample(Sample::new(0, 0.0, 0.0, 0.0, 0.0, 0.0)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = FluxConfig::default();
        config.window.stress_window_ms = 0;
        let result = Session::start(
            config,
            None,
            MemoryRenderTarget::new(),
            Arc::new(SystemClock),
        );
        assert!(result.is_err());
    }
}
