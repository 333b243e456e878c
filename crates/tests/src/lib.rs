//! # Integration Tests
//!
//! 跨 crate 端到端场景。
//!
//! 负责：
//! - 通道溢出策略性质
//! - 批处理：线程池乱序完成后按序重组
//! - 实时：最新值语义与关停排空
//! - 配置文件 → 驱动 → 文件输出 全链路

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ConfigVersion, ContractError, PipelineBlueprint};

    #[test]
    fn test_unsupported_version_rejected() {
        let err = ConfigLoader::load_from_str("version = \"V9\"\n", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_default_blueprint_is_current_version() {
        let blueprint = ConfigLoader::load_from_str("version = \"V1\"\n", ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.version, ConfigVersion::V1);
        assert_eq!(blueprint, PipelineBlueprint::default());
        assert!(ConfigLoader::validate(&blueprint).is_ok());
    }
}

#[cfg(test)]
mod channel_tests {
    use std::thread;
    use std::time::Duration;

    use ingestion::{BoundedChannel, ChannelConfig, PopError, PushOutcome};
    use rand::Rng;

    /// Drop-oldest never exceeds capacity and keeps the newest C items in push order.
    #[test]
    fn test_drop_oldest_keeps_newest_in_order() {
        let mut rng = rand::rng();
        for capacity in [1usize, 2, 5, 16] {
            let ch = BoundedChannel::new("burst", ChannelConfig::drop_oldest(capacity)).unwrap();
            let mut pushed = Vec::new();
            let mut next = 0u64;

            for _ in 0..20 {
                let burst = rng.random_range(1..3 * capacity + 2);
                for _ in 0..burst {
                    ch.push(next).unwrap();
                    pushed.push(next);
                    next += 1;
                    assert!(ch.len() <= capacity);
                }

                let mut retained = Vec::new();
                while let Ok(v) = ch.try_pop() {
                    retained.push(v);
                }
                let expected: Vec<u64> = pushed.iter().rev().take(capacity).rev().copied().collect();
                assert_eq!(retained, expected, "capacity {capacity}");
                pushed.clear();
            }
        }
    }

    #[test]
    fn test_drop_oldest_reports_eviction() {
        let ch = BoundedChannel::new("s", ChannelConfig::drop_oldest(1)).unwrap();
        assert_eq!(ch.push(1).unwrap(), PushOutcome::Enqueued);
        assert_eq!(ch.push(2).unwrap(), PushOutcome::Evicted);
        assert_eq!(ch.try_pop(), Ok(2));
        assert_eq!(ch.stats().evicted, 1);
    }

    /// A blocked pusher stays blocked while full and proceeds after a pop.
    #[test]
    fn test_blocked_pusher_unblocks_on_pop() {
        let ch = BoundedChannel::new("in", ChannelConfig::blocking(2)).unwrap();
        ch.push(0u64).unwrap();
        ch.push(1).unwrap();

        let pusher = {
            let ch = ch.clone();
            thread::spawn(move || ch.push(2))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!pusher.is_finished(), "push must block while full");
        assert_eq!(ch.len(), 2);

        assert_eq!(ch.pop_timeout(Duration::from_millis(10)), Ok(0));
        assert!(pusher.join().unwrap().is_ok());
        assert_eq!(ch.pop_timeout(Duration::from_millis(10)), Ok(1));
        assert_eq!(ch.pop_timeout(Duration::from_millis(10)), Ok(2));
        assert_eq!(ch.pop_timeout(Duration::from_millis(10)), Err(PopError::Empty));
    }
}

#[cfg(test)]
mod batch_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use contracts::{Signals, Transform, TransformError};
    use dispatcher::MemorySink;
    use pipeline::{BatchPipeline, BatchSettings, PipelineError};
    use rand::Rng;
    use sources::IterSource;

    const FAST: Duration = Duration::from_millis(10);

    fn doubled() -> Arc<dyn Transform<u64, u64>> {
        Arc::new(|x: u64| -> Result<u64, TransformError> { Ok(x * 2) })
    }

    /// Random per-item latency so completion order differs from index order.
    fn jittered_square() -> Arc<dyn Transform<u64, u64>> {
        Arc::new(|x: u64| -> Result<u64, TransformError> {
            let micros = rand::rng().random_range(0..800);
            thread::sleep(Duration::from_micros(micros));
            Ok(x * x)
        })
    }

    #[test]
    fn test_ten_items_three_workers_in_order() {
        let mut sink = MemorySink::new("out");
        let settings = BatchSettings::new(3)
            .with_input_capacity(5)
            .with_timeouts(FAST, FAST);

        let report = BatchPipeline::new(settings, Signals::new())
            .run(IterSource::new("reader", (0..10u64).collect()), doubled(), &mut sink)
            .unwrap();

        assert_eq!(sink.items(), Some(vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]));
        assert!(report.missing.is_empty());
        assert_eq!(report.total, 10);
        assert_eq!(report.written, 10);
    }

    #[test]
    fn test_order_restored_for_any_pool_size() {
        const N: u64 = 64;
        let expected: Vec<u64> = (0..N).map(|x| x * x).collect();

        for workers in [1usize, 4, 16] {
            let mut sink = MemorySink::new("out");
            let settings = BatchSettings::new(workers)
                .with_input_capacity(8)
                .with_timeouts(FAST, FAST);

            let report = BatchPipeline::new(settings, Signals::new())
                .run(IterSource::new("reader", (0..N).collect()), jittered_square(), &mut sink)
                .unwrap();

            assert!(report.is_complete(), "workers={workers}");
            assert_eq!(report.pool.workers.len(), workers);
            assert_eq!(sink.items(), Some(expected.clone()), "workers={workers}");
        }
    }

    #[test]
    fn test_single_failure_reports_exact_index() {
        let bad = 7u64;
        let transform: Arc<dyn Transform<u64, u64>> =
            Arc::new(move |x: u64| -> Result<u64, TransformError> {
                if x == bad {
                    Err(TransformError::new("inference failed"))
                } else {
                    Ok(x)
                }
            });

        let started = Instant::now();
        let mut sink = MemorySink::new("out");
        let err = BatchPipeline::new(
            BatchSettings::new(4).with_input_capacity(5).with_timeouts(FAST, FAST),
            Signals::new(),
        )
        .run(IterSource::new("reader", (0..20u64).collect()), transform, &mut sink)
        .unwrap_err();

        match err {
            PipelineError::Incomplete { total, missing } => {
                assert_eq!(total, 20);
                assert_eq!(missing, vec![bad]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!sink.was_written());
        assert!(started.elapsed() < Duration::from_secs(5), "pipeline must not hang");
    }

    #[test]
    fn test_partial_report_counts_failed_item() {
        let transform: Arc<dyn Transform<u64, u64>> =
            Arc::new(|x: u64| -> Result<u64, TransformError> {
                if x == 3 {
                    Err(TransformError::new("bad frame"))
                } else {
                    Ok(x)
                }
            });

        let mut sink = MemorySink::new("out");
        let report = BatchPipeline::new(
            BatchSettings::new(3)
                .with_input_capacity(4)
                .with_timeouts(FAST, FAST)
                .with_allow_partial(true),
            Signals::new(),
        )
        .run(IterSource::new("reader", (0..12u64).collect()), transform, &mut sink)
        .unwrap();

        assert_eq!(report.pool.processed(), 11);
        assert_eq!(report.pool.retried(), 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 3);
        assert_eq!(report.missing, vec![3]);
        assert_eq!(report.written, 11);
        assert_eq!(
            report.pool.workers.iter().map(|w| w.processed).sum::<u64>(),
            report.pool.processed()
        );
    }

    #[test]
    fn test_external_stop_still_joins() {
        let signals = Signals::new();
        let stopper = {
            let signals = signals.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signals.request_stop();
            })
        };

        let slow: Arc<dyn Transform<u64, u64>> = Arc::new(|x: u64| -> Result<u64, TransformError> {
            thread::sleep(Duration::from_millis(2));
            Ok(x)
        });
        let source = IterSource::new("reader", (0..10_000u64).collect())
            .with_pause(Duration::from_millis(1));

        let mut sink = MemorySink::new("out");
        let result = BatchPipeline::new(
            BatchSettings::new(2).with_input_capacity(4).with_timeouts(FAST, FAST),
            signals,
        )
        .run(source, slow, &mut sink);
        stopper.join().unwrap();

        match result {
            Err(PipelineError::Incomplete { total, missing }) => {
                assert_eq!(total, 10_000);
                assert!(!missing.is_empty());
            }
            other => panic!("expected incomplete output, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod shutdown_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use contracts::{IndexedItem, Signals, Transform, TransformError};
    use dispatcher::{PoolConfig, WorkerExit, WorkerPool};
    use ingestion::{BoundedChannel, ChannelConfig};
    use reassembly::LatestSlot;

    fn identity() -> Arc<dyn Transform<u32, u32>> {
        Arc::new(|x: u32| -> Result<u32, TransformError> { Ok(x) })
    }

    #[test]
    fn test_latest_slot_last_writer_wins() {
        let mut slot = LatestSlot::new();
        slot.accept(IndexedItem::new(0, "v1"));
        slot.accept(IndexedItem::new(1, "v2"));

        assert_eq!(slot.consume_if_present().map(|i| i.value), Some("v2"));
        assert!(slot.consume_if_present().is_none());
    }

    /// Stop arrives while the worker waits on an empty input: it leaves within one timeout.
    #[test]
    fn test_idle_worker_exits_within_timeout() {
        let timeout = Duration::from_millis(100);
        let input = BoundedChannel::new("in", ChannelConfig::blocking(4)).unwrap();
        let output = BoundedChannel::new("out", ChannelConfig::blocking(4)).unwrap();
        let signals = Signals::new();

        let pool = WorkerPool::start(
            PoolConfig::new("idle", 1).with_pop_timeout(timeout),
            identity(),
            input,
            output,
            signals.clone(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        let stopped_at = Instant::now();
        signals.request_stop();
        let report = pool.join_all();

        assert!(stopped_at.elapsed() < timeout * 3);
        assert_eq!(report.workers[0].exit, WorkerExit::Drained);
    }

    /// Items already queued when stop is set are still delivered.
    #[test]
    fn test_stop_drains_queued_items() {
        let input = BoundedChannel::new("in", ChannelConfig::blocking(8)).unwrap();
        let output = BoundedChannel::new("out", ChannelConfig::blocking(8)).unwrap();
        let signals = Signals::new();

        let pool = WorkerPool::start(
            PoolConfig::new("drain", 1).with_pop_timeout(Duration::from_millis(50)),
            identity(),
            input.clone(),
            output.clone(),
            signals.clone(),
        )
        .unwrap();

        // worker is parked in its timed wait
        thread::sleep(Duration::from_millis(20));
        for i in 0..5u32 {
            input.push(IndexedItem::new(u64::from(i), i * 10)).unwrap();
        }
        signals.request_stop();
        let report = pool.join_all();

        let mut delivered: Vec<(u64, u32)> = Vec::new();
        while let Ok(item) = output.try_pop() {
            delivered.push((item.index, item.value));
        }
        delivered.sort_unstable();

        assert_eq!(delivered, vec![(0, 0), (1, 10), (2, 20), (3, 30), (4, 40)]);
        assert_eq!(report.processed(), 5);
        assert!(input.is_empty());
    }
}

#[cfg(test)]
mod live_tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use contracts::{CameraConfig, DeviceKind, PipelineBlueprint, SensorConfig, Signals};
    use dispatcher::RecordingLiveSink;
    use ingestion::ChannelConfig;
    use pipeline::{LiveLimits, LivePipeline, LiveSettings, PipelineDriver};
    use sources::SimulatedSensor;

    fn settings(tick: Duration) -> LiveSettings {
        LiveSettings {
            tick_interval: tick,
            sensor_channel: ChannelConfig::drop_oldest(1),
            camera_channel: ChannelConfig::drop_oldest(1),
            max_ticks: None,
            max_duration: None,
        }
    }

    #[test]
    fn test_three_sensors_deliver_latest_value() {
        let mut pipeline = LivePipeline::new(
            settings(Duration::from_millis(4)).with_max_duration(Some(Duration::from_millis(300))),
            Signals::new(),
        );
        for (id, delay) in [("fast", 1u64), ("medium", 5), ("slow", 23)] {
            pipeline
                .add_sensor(SimulatedSensor::new(id, Duration::from_millis(delay)))
                .unwrap();
        }

        let mut sink = RecordingLiveSink::new();
        let report = pipeline.run(&mut sink).unwrap();

        assert!(report.ticks > 0);
        assert_eq!(report.channels.len(), 3);
        for channel in &report.channels {
            let produced = channel.last_produced.expect("every sensor produced");
            let delivered = channel.last_delivered.expect("every sensor delivered");
            assert!(
                produced.abs_diff(delivered) <= 1,
                "{}: produced {produced}, delivered {delivered}",
                channel.source_id
            );
        }
        // fresh values per sensor are strictly increasing across ticks
        let mut last: HashMap<String, u64> = HashMap::new();
        for view in sink.views() {
            for reading in view.sensors.iter().filter(|r| r.fresh) {
                let value = reading.latest.as_ref().unwrap().value;
                if let Some(prev) = last.insert(reading.source_id.to_string(), value) {
                    assert!(value > prev, "{}: {value} after {prev}", reading.source_id);
                }
            }
        }
        assert!(sink.is_closed());
    }

    fn quick_blueprint() -> PipelineBlueprint {
        let mut blueprint = PipelineBlueprint::default();
        blueprint.live.target_fps = 200;
        blueprint.live.sensors = vec![
            SensorConfig::new("sensor_1", 2),
            SensorConfig::new("sensor_2", 5),
            SensorConfig::new("sensor_3", 11),
        ];
        blueprint.camera = CameraConfig {
            width: 16,
            height: 8,
            fps: 100,
            device: DeviceKind::Synthetic,
            fail_after: Some(5),
            ..CameraConfig::default()
        };
        blueprint
    }

    #[test]
    fn test_camera_disconnect_aborts_run() {
        let blueprint = quick_blueprint();
        config_loader::ConfigLoader::validate(&blueprint).unwrap();

        let driver = PipelineDriver::new(blueprint, Signals::new());
        let mut sink = RecordingLiveSink::new();
        let err = driver
            .run_live(
                &mut sink,
                LiveLimits {
                    max_ticks: None,
                    max_duration: Some(Duration::from_secs(10)),
                },
            )
            .unwrap_err();

        let cause = err.fatal_cause().expect("camera failure is fatal");
        assert_eq!(cause.source_id.as_deref(), Some("camera"));
        assert!(driver.signals().is_fatal());
        assert!(sink.is_closed());
    }

    #[test]
    fn test_driver_stops_on_tick_limit() {
        let mut blueprint = quick_blueprint();
        blueprint.camera.fail_after = None;

        let driver = PipelineDriver::new(blueprint, Signals::new());
        let mut sink = RecordingLiveSink::new();
        let report = driver
            .run_live(
                &mut sink,
                LiveLimits {
                    max_ticks: Some(20),
                    max_duration: None,
                },
            )
            .unwrap();

        assert_eq!(report.ticks, 20);
        assert_eq!(sink.len(), 20);
        assert!(!driver.signals().is_fatal());
        let overlay = sink.last().unwrap().overlay_text();
        assert!(overlay.starts_with("Sensor1: "), "{overlay}");
    }
}

#[cfg(test)]
mod file_roundtrip_tests {
    use std::fs;
    use std::path::Path;

    use config_loader::ConfigLoader;
    use contracts::{Frame, Signals};
    use dispatcher::{FileSink, FrameManifest};
    use pipeline::PipelineDriver;

    const WIDTH: u32 = 4;
    const HEIGHT: u32 = 2;
    const FRAMES: usize = 6;

    fn write_input(path: &Path) -> Vec<u8> {
        let frame_len = Frame::byte_len(WIDTH, HEIGHT);
        let bytes: Vec<u8> = (0..FRAMES * frame_len).map(|i| (i * 7 % 251) as u8).collect();
        fs::write(path, &bytes).unwrap();
        bytes
    }

    fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
        let config = format!(
            r#"
[camera]
width = {WIDTH}
height = {HEIGHT}

[batch]
input_path = "{input}"
output_path = "{output}"
workers = 3
input_queue_capacity = 2
transform = "invert"
{extra}

[runtime]
pop_timeout_ms = 20
poll_interval_ms = 5
"#,
            input = dir.join("input.rgb").display(),
            output = dir.join("output.rgb").display(),
        );
        let path = dir.join("framepipe.toml");
        fs::write(&path, config).unwrap();
        path
    }

    #[test]
    fn test_config_to_raw_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir.path().join("input.rgb"));
        let blueprint = ConfigLoader::load_from_path(&write_config(dir.path(), "")).unwrap();

        let mut sink = FileSink::from_config(&blueprint.batch);
        let driver = PipelineDriver::new(blueprint, Signals::new());
        let report = driver.run_batch(&mut sink).unwrap();

        assert_eq!(report.total, FRAMES);
        assert!(report.is_complete());

        let output = fs::read(dir.path().join("output.rgb")).unwrap();
        let inverted: Vec<u8> = input.iter().map(|b| 255 - b).collect();
        assert_eq!(output, inverted);

        let manifest = read_manifest(&dir.path().join("output.rgb.json"));
        assert_eq!(manifest.frame_count, FRAMES);
        assert_eq!((manifest.width, manifest.height), (WIDTH, HEIGHT));
    }

    #[test]
    fn test_config_to_png_sequence() {
        let dir = tempfile::tempdir().unwrap();
        write_input(&dir.path().join("input.rgb"));
        let blueprint =
            ConfigLoader::load_from_path(&write_config(dir.path(), "output_format = \"png_sequence\""))
                .unwrap();

        let mut sink = FileSink::from_config(&blueprint.batch);
        PipelineDriver::new(blueprint, Signals::new())
            .run_batch(&mut sink)
            .unwrap();

        let out_dir = dir.path().join("output.rgb");
        for i in 0..FRAMES {
            assert!(out_dir.join(format!("frame_{i:06}.png")).exists(), "frame {i}");
        }
        assert!(out_dir.join("manifest.json").exists());
    }

    #[test]
    fn test_missing_input_fails_before_threads_start() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = ConfigLoader::load_from_path(&write_config(dir.path(), "")).unwrap();

        let mut sink = FileSink::from_config(&blueprint.batch);
        let err = PipelineDriver::new(blueprint, Signals::new())
            .run_batch(&mut sink)
            .unwrap_err();

        assert!(matches!(err, pipeline::PipelineError::Source(_)));
        assert!(!dir.path().join("output.rgb").exists());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = ConfigLoader::load_from_path(&write_config(dir.path(), "")).unwrap();

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let reparsed = ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml).unwrap();
        assert_eq!(reparsed, blueprint);
    }

    fn read_manifest(path: &Path) -> FrameManifest {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }
}
