//! 流水线指标
//!
//! 通过 `metrics` facade 上报 (Prometheus exporter 安装后可抓取)，
//! 同时提供内存聚合器用于运行结束时输出摘要。

use std::collections::BTreeMap;

use contracts::LiveView;
use metrics::{counter, gauge, histogram};

// ============================================================================
// Facade helpers
// ============================================================================

/// 记录一次渲染 tick
pub fn record_render_tick(render_ms: f64, fresh_channels: usize) {
    counter!("framepipe_render_ticks_total").increment(1);
    histogram!("framepipe_render_duration_ms").record(render_ms);
    gauge!("framepipe_render_fresh_channels").set(fresh_channels as f64);
}

/// 记录一项成功变换
pub fn record_item_processed(pool: &str, latency_ms: f64) {
    counter!("framepipe_pool_items_processed_total", "pool" => pool.to_string()).increment(1);
    histogram!("framepipe_pool_transform_ms", "pool" => pool.to_string()).record(latency_ms);
}

/// 记录一项失败变换 (`reason`: "error" | "panic")
pub fn record_item_failed(pool: &str, reason: &'static str) {
    counter!(
        "framepipe_pool_items_failed_total",
        "pool" => pool.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录一次重试
pub fn record_item_retried(pool: &str) {
    counter!("framepipe_pool_items_retried_total", "pool" => pool.to_string()).increment(1);
}

/// 记录重组表进度
pub fn record_reassembly_progress(filled: usize, total: usize) {
    gauge!("framepipe_reassembly_filled").set(filled as f64);
    gauge!("framepipe_reassembly_expected").set(total as f64);
}

/// 记录被重组表拒绝的写入 (`kind`: "duplicate" | "out_of_range")
pub fn record_accept_rejected(kind: &'static str) {
    counter!("framepipe_reassembly_rejected_total", "kind" => kind).increment(1);
}

/// 记录批处理最终结果
pub fn record_batch_result(written: usize, missing: usize) {
    counter!("framepipe_batch_items_written_total").increment(written as u64);
    gauge!("framepipe_batch_items_missing").set(missing as f64);
}

// ============================================================================
// Live aggregation
// ============================================================================

/// 实时渲染指标聚合器
///
/// 按通道统计每个 tick 拿到新值 (fresh) 还是沿用旧值 (stale)。
#[derive(Debug, Clone, Default)]
pub struct LiveStatsAggregator {
    /// 渲染 tick 数
    pub ticks: u64,

    /// 渲染耗时统计 (毫秒)
    pub render_ms: RunningStats,

    /// 各通道收到新值的 tick 数
    pub fresh_counts: BTreeMap<String, u64>,

    /// 各通道沿用旧值的 tick 数
    pub stale_counts: BTreeMap<String, u64>,
}

impl LiveStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, view: &LiveView, render_ms: f64) {
        self.ticks += 1;
        self.render_ms.push(render_ms);

        let sensors = view.sensors.iter().map(|r| (r.source_id.as_str(), r.fresh, r.latest.is_some()));
        let camera = view
            .camera
            .iter()
            .map(|r| (r.source_id.as_str(), r.fresh, r.latest.is_some()));

        for (id, fresh, has_value) in sensors.chain(camera) {
            if fresh {
                *self.fresh_counts.entry(id.to_string()).or_insert(0) += 1;
            } else if has_value {
                *self.stale_counts.entry(id.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> LiveSummary {
        LiveSummary {
            ticks: self.ticks,
            render_ms: StatsSummary::from(&self.render_ms),
            fresh_counts: self.fresh_counts.clone(),
            stale_counts: self.stale_counts.clone(),
        }
    }
}

/// 实时运行摘要
#[derive(Debug, Clone, Default)]
pub struct LiveSummary {
    pub ticks: u64,
    pub render_ms: StatsSummary,
    pub fresh_counts: BTreeMap<String, u64>,
    pub stale_counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for LiveSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Live Render Summary ===")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Render time (ms): {}", self.render_ms)?;
        for (id, fresh) in &self.fresh_counts {
            let stale = self.stale_counts.get(id).copied().unwrap_or(0);
            writeln!(f, "  {id}: fresh={fresh} stale={stale}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Running statistics
// ============================================================================

/// 统计摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
///
/// 每个工作线程各自累积，结束时用 `merge` 合并。
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 合并另一组统计 (Chan 并行公式)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let n_a = self.count as f64;
        let n_b = other.count as f64;

        self.mean += delta * n_b / count as f64;
        self.m2 += other.m2 + delta * delta * n_a * n_b / count as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = count;
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
