//! Live topology
//!
//! ```text
//! Producer(sensor_i) ─► BoundedChannel(drop-oldest, 1) ─┐
//!                                                       ├─► LiveReassembler ─► render tick
//! Producer(camera)   ─► BoundedChannel(drop-oldest, 1) ─┘
//! ```
//!
//! The render loop never blocks on a channel. Each tick drains whatever is
//! there, keeps the freshest value per channel, and sleeps out the rest of
//! the tick interval. A channel with nothing new shows its previous value.

use std::time::{Duration, Instant};

use contracts::{
    ChannelReading, DataSource, Frame, IndexedItem, LiveConfig, LiveSink, LiveView, Signals,
    SourceId,
};
use ingestion::{BoundedChannel, ChannelConfig, Producer, ProducerHandle, ProducerReport};
use observability::{record_render_tick, LiveStatsAggregator};
use reassembly::LiveReassembler;
use tracing::{debug, error, info, instrument};

use crate::error::{PipelineError, Result};
use crate::shutdown::ShutdownCoordinator;
use crate::stats::{ChannelReport, LiveReport};

type Launch = Box<dyn FnOnce() -> ingestion::Result<ProducerHandle>>;

/// Live loop settings
#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub tick_interval: Duration,
    pub sensor_channel: ChannelConfig,
    pub camera_channel: ChannelConfig,

    /// Stop after this many render ticks
    pub max_ticks: Option<u64>,

    /// Stop after this much wall time
    pub max_duration: Option<Duration>,
}

impl LiveSettings {
    pub fn from_config(config: &LiveConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            sensor_channel: ChannelConfig::new(config.sensor_queue_capacity, config.sensor_overflow),
            camera_channel: ChannelConfig::new(config.camera_queue_capacity, config.camera_overflow),
            max_ticks: None,
            max_duration: None,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Option<Duration>) -> Self {
        self.max_duration = max_duration;
        self
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self::from_config(&LiveConfig::default())
    }
}

/// Last-seen value of one channel across ticks
struct Retained<T> {
    latest: Option<IndexedItem<T>>,
}

impl<T> Default for Retained<T> {
    fn default() -> Self {
        Self { latest: None }
    }
}

impl<T: Clone> Retained<T> {
    fn reading(&mut self, source_id: SourceId, fresh: Option<IndexedItem<T>>) -> ChannelReading<T> {
        let is_fresh = fresh.is_some();
        if fresh.is_some() {
            self.latest = fresh;
        }
        ChannelReading {
            source_id,
            latest: self.latest.clone(),
            fresh: is_fresh,
        }
    }
}

/// Sensor + camera fan-in rendered at a fixed tick rate
pub struct LivePipeline {
    settings: LiveSettings,
    signals: Signals,
    coordinator: ShutdownCoordinator,
    sensors: LiveReassembler<u64>,
    camera: LiveReassembler<Frame>,
    sensor_state: Vec<Retained<u64>>,
    camera_state: Retained<Frame>,
    launches: Vec<Launch>,
}

impl LivePipeline {
    pub fn new(settings: LiveSettings, signals: Signals) -> Self {
        Self {
            settings,
            coordinator: ShutdownCoordinator::new(signals.clone()),
            signals,
            sensors: LiveReassembler::new(),
            camera: LiveReassembler::new(),
            sensor_state: Vec::new(),
            camera_state: Retained::default(),
            launches: Vec::new(),
        }
    }

    /// Add a scalar channel. Rendered in the order added.
    ///
    /// # Errors
    /// Invalid channel capacity.
    pub fn add_sensor<S>(&mut self, source: S) -> Result<()>
    where
        S: DataSource<Item = u64> + 'static,
    {
        let channel = BoundedChannel::new(source.source_id().as_str(), self.settings.sensor_channel)?;
        self.sensors.attach(source.source_id().clone(), channel.clone());
        self.sensor_state.push(Retained::default());
        self.attach(source, channel);
        Ok(())
    }

    /// Set the camera channel. At most one camera is rendered.
    ///
    /// # Errors
    /// Invalid channel capacity.
    pub fn set_camera<S>(&mut self, source: S) -> Result<()>
    where
        S: DataSource<Item = Frame> + 'static,
    {
        let channel = BoundedChannel::new(source.source_id().as_str(), self.settings.camera_channel)?;
        self.camera = LiveReassembler::new();
        self.camera.attach(source.source_id().clone(), channel.clone());
        self.attach(source, channel);
        Ok(())
    }

    fn attach<S>(&mut self, source: S, channel: BoundedChannel<IndexedItem<S::Item>>)
    where
        S: DataSource + 'static,
    {
        self.coordinator.register_channel(channel.clone());
        let producer = Producer::new(source, channel, self.signals.clone());
        self.launches.push(Box::new(move || producer.spawn()));
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Run until a stop signal, a fatal signal, or a configured limit.
    ///
    /// # Errors
    /// - `Ingestion` if a producer thread cannot be created
    /// - `Fatal` if any source raised the fatal signal
    #[instrument(name = "live_pipeline_run", skip_all, fields(sink = sink.name()))]
    pub fn run(mut self, sink: &mut dyn LiveSink) -> Result<LiveReport> {
        let started = Instant::now();
        let launches = std::mem::take(&mut self.launches);
        info!(
            sensors = self.sensors.len(),
            camera = !self.camera.is_empty(),
            tick_ms = self.settings.tick_interval.as_millis() as u64,
            "starting live pipeline"
        );

        let mut handles = Vec::with_capacity(launches.len());
        for launch in launches {
            match launch() {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(error = %e, "failed to start producer");
                    self.coordinator.request_stop();
                    self.coordinator
                        .teardown(|| (), || join_all(handles), || sink.close());
                    return Err(e.into());
                }
            }
        }

        let mut aggregator = LiveStatsAggregator::new();
        let ticks = self.render_loop(sink, &mut aggregator, started);

        let (_, producers, _) = self
            .coordinator
            .teardown(|| (), || join_all(handles), || sink.close());

        if let Some(cause) = self.signals.fatal_cause() {
            error!(%cause, ticks, "live pipeline aborted");
            return Err(PipelineError::Fatal(cause.clone()));
        }

        // channels are closed and producers joined; whatever is left is the
        // freshest value each producer managed to push before stopping
        self.sensors.collect();
        self.camera.collect();
        self.take_readings();
        let report = LiveReport {
            ticks,
            duration: started.elapsed(),
            channels: self.channel_reports(producers),
            summary: aggregator.summary(),
        };
        info!(ticks, duration_ms = report.duration.as_millis() as u64, "live pipeline finished");
        Ok(report)
    }

    fn render_loop(
        &mut self,
        sink: &mut dyn LiveSink,
        aggregator: &mut LiveStatsAggregator,
        started: Instant,
    ) -> u64 {
        let mut tick = 0u64;

        while self.coordinator.observe().is_running() {
            if self.limit_reached(tick, started) {
                debug!(tick, "live limit reached");
                self.coordinator.request_stop();
                break;
            }

            let tick_started = Instant::now();
            self.sensors.collect();
            self.camera.collect();

            let (sensors, camera) = self.take_readings();
            let view = LiveView {
                tick,
                sensors,
                camera,
            };
            sink.render(&view);

            let render_ms = tick_started.elapsed().as_secs_f64() * 1000.0;
            let fresh = view.sensors.iter().filter(|r| r.fresh).count()
                + usize::from(view.camera.as_ref().is_some_and(|c| c.fresh));
            record_render_tick(render_ms, fresh);
            aggregator.update(&view, render_ms);
            tick += 1;

            if self.sensors.all_closed() && self.camera.all_closed() {
                info!(tick, "every live channel has closed");
                self.coordinator.request_stop();
                break;
            }

            let spent = tick_started.elapsed();
            std::thread::sleep(self.settings.tick_interval.saturating_sub(spent));
        }
        tick
    }

    /// Consume every slot, folding fresh values into the retained state.
    fn take_readings(&mut self) -> (Vec<ChannelReading<u64>>, Option<ChannelReading<Frame>>) {
        let sensors = self
            .sensors
            .consume_all()
            .into_iter()
            .zip(self.sensor_state.iter_mut())
            .map(|((id, fresh), state)| state.reading(id, fresh))
            .collect();
        let camera = self
            .camera
            .consume_all()
            .into_iter()
            .next()
            .map(|(id, fresh)| self.camera_state.reading(id, fresh));
        (sensors, camera)
    }

    fn limit_reached(&self, tick: u64, started: Instant) -> bool {
        self.settings.max_ticks.is_some_and(|max| tick >= max)
            || self
                .settings
                .max_duration
                .is_some_and(|max| started.elapsed() >= max)
    }

    fn last_delivered(&self, source_id: &SourceId) -> Option<u64> {
        let sensor = self
            .sensors
            .source_ids()
            .zip(&self.sensor_state)
            .find(|(id, _)| *id == source_id)
            .map(|(_, state)| state.latest.as_ref().map(|i| i.index));
        match sensor {
            Some(index) => index,
            None => self
                .camera
                .source_ids()
                .any(|id| id == source_id)
                .then(|| self.camera_state.latest.as_ref().map(|i| i.index))
                .flatten(),
        }
    }

    fn channel_reports(&self, producers: Vec<ProducerReport>) -> Vec<ChannelReport> {
        let stats = self.coordinator.channel_stats();
        producers
            .into_iter()
            .map(|p| {
                let evicted = stats
                    .iter()
                    .find(|(name, _)| p.source_id == name.as_str())
                    .map_or(0, |(_, s)| s.evicted);
                ChannelReport {
                    last_delivered: self.last_delivered(&p.source_id),
                    source_id: p.source_id,
                    produced: p.produced,
                    last_produced: p.last_index,
                    evicted,
                    exit: p.exit,
                }
            })
            .collect()
    }
}

fn join_all(handles: Vec<ProducerHandle>) -> Vec<ProducerReport> {
    handles.into_iter().map(ProducerHandle::join).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Exhaustion;
    use dispatcher::RecordingLiveSink;
    use sources::IterSource;

    fn settings() -> LiveSettings {
        LiveSettings {
            tick_interval: Duration::from_millis(5),
            ..LiveSettings::default()
        }
    }

    fn quiet(id: &str, values: Vec<u64>) -> IterSource<u64> {
        IterSource::new(id, values)
            .with_exhaustion(Exhaustion::Quiet)
            .with_pause(Duration::from_millis(2))
    }

    #[test]
    fn test_camera_overflow_independent_of_sensors() {
        let config = LiveConfig {
            sensor_overflow: contracts::OverflowPolicy::Block,
            ..LiveConfig::default()
        };
        let settings = LiveSettings::from_config(&config);
        assert_eq!(settings.sensor_channel.policy, contracts::OverflowPolicy::Block);
        assert_eq!(settings.camera_channel.policy, contracts::OverflowPolicy::DropOldest);
        assert_eq!(settings.camera_channel.capacity, 1);
    }

    #[test]
    fn test_stops_when_every_channel_closes() {
        let mut pipeline = LivePipeline::new(settings(), Signals::new());
        pipeline.add_sensor(quiet("a", vec![1, 2, 3])).unwrap();
        pipeline.add_sensor(quiet("b", vec![7])).unwrap();

        let mut sink = RecordingLiveSink::new();
        let report = pipeline.run(&mut sink).unwrap();

        let a = report.channel("a").unwrap();
        assert_eq!(a.produced, 3);
        assert_eq!(a.last_delivered, Some(2));
        assert_eq!(report.channel("b").unwrap().last_delivered, Some(0));
        assert!(sink.is_closed());
        assert_eq!(sink.len() as u64, report.ticks);
    }

    #[test]
    fn test_retains_last_seen_value() {
        let mut pipeline = LivePipeline::new(settings(), Signals::new());
        pipeline
            .add_sensor(IterSource::new("once", vec![42u64]).with_exhaustion(Exhaustion::Quiet))
            .unwrap();
        pipeline
            .add_sensor(IterSource::new("never", Vec::<u64>::new()).with_exhaustion(Exhaustion::Quiet))
            .unwrap();
        pipeline.add_sensor(quiet("steady", (0..20).collect())).unwrap();

        let mut sink = RecordingLiveSink::new();
        pipeline.run(&mut sink).unwrap();

        let views = sink.views();
        let first_seen = views
            .iter()
            .position(|v| v.sensors[0].latest.is_some())
            .unwrap();
        assert!(views[first_seen].sensors[0].fresh);
        for view in &views[first_seen + 1..] {
            assert!(!view.sensors[0].fresh);
            assert_eq!(view.sensors[0].latest.as_ref().map(|i| i.value), Some(42));
        }
        assert!(views.iter().all(|v| v.sensors[1].latest.is_none()));
        assert!(views.last().unwrap().overlay_text().starts_with("Sensor1: 42  Sensor2: -"));
    }

    #[test]
    fn test_max_ticks_limit() {
        let mut pipeline = LivePipeline::new(settings().with_max_ticks(Some(5)), Signals::new());
        pipeline
            .add_sensor(IterSource::new("s", (0..1000u64).collect()).with_pause(Duration::from_millis(1)))
            .unwrap();

        let mut sink = RecordingLiveSink::new();
        let report = pipeline.run(&mut sink).unwrap();
        assert_eq!(report.ticks, 5);
        assert_eq!(sink.len(), 5);
    }

    #[test]
    fn test_camera_end_of_stream_is_fatal() {
        let mut pipeline = LivePipeline::new(settings(), Signals::new());
        pipeline.add_sensor(quiet("s", (0..1000).collect())).unwrap();
        pipeline
            .set_camera(
                IterSource::new("camera", vec![Frame::filled(2, 2, [0, 0, 0])])
                    .with_exhaustion(Exhaustion::Fatal),
            )
            .unwrap();

        let mut sink = RecordingLiveSink::new();
        let err = pipeline.run(&mut sink).unwrap_err();

        let cause = err.fatal_cause().unwrap();
        assert_eq!(cause.source_id.as_deref(), Some("camera"));
        assert!(sink.is_closed());
    }
}
