//! 声道时间线同步漂移估计
//!
//! 在文件中均匀分布的若干片段上，对5 ms RMS包络求两声道的延迟，
//! 漂移 = 最后一个片段的延迟 - 第一个片段的延迟，斜率由延迟对时间的线性回归给出。
//! 只扫描片段内的样本，长文件的开销与文件长度无关。
//!
//! 对话录音中两声道的包络因轮流说话而整体负相关，直接互相关找不到延迟；
//! 因此比较的是dB包络的逐点变化量（限幅），串音使静音侧跟随活动侧的电平起伏。
//!
//! 延迟为正表示声道1滞后于声道0。

use crate::core::statistics::{LinearFit, pearson};
use crate::core::{ChannelMode, SampleBuffer, StereoConfig, WindowProcessor};
use crate::error::AnalysisResult;
use crate::processing::CancellationToken;
use serde::{Deserialize, Serialize};

/// 片段内至少需要的包络点数（相对最大搜索延迟的倍数）
const MIN_ENVELOPE_LAG_RATIO: usize = 4;

/// dB包络的下限，数字静音不产生 -inf
const ENVELOPE_FLOOR_DB: f64 = -120.0;

/// 单步电平变化的限幅（dB），抑制说话人切换处的大跳变
const MAX_LEVEL_STEP_DB: f64 = 6.0;

/// 单片段延迟测量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentOffset {
    /// 片段中心时间（秒）
    pub time_seconds: f64,
    pub offset_ms: f64,
    /// 互相关峰值
    pub correlation: f64,
}

/// 同步漂移估计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDriftEstimate {
    pub segments: Vec<SegmentOffset>,
    /// 最后一个片段与第一个片段的延迟差（毫秒）
    pub drift_ms: f64,
    /// 回归斜率（毫秒/小时）
    pub drift_ms_per_hour: f64,
}

pub struct DriftEstimator<'a> {
    config: &'a StereoConfig,
}

impl<'a> DriftEstimator<'a> {
    pub fn new(config: &'a StereoConfig) -> Self {
        Self { config }
    }

    /// 估计声道0与声道1之间的漂移，有效片段少于2个时返回 None
    pub fn estimate(
        &self,
        buffer: &SampleBuffer,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Option<SyncDriftEstimate>> {
        let cfg = self.config;
        if buffer.channel_count() < 2 || buffer.is_empty() || cfg.drift_segments == 0 {
            return Ok(None);
        }

        let envelope_frames = buffer.ms_to_frames(cfg.drift_envelope_ms);
        let envelope_ms = envelope_frames as f64 * 1000.0 / buffer.sample_rate() as f64;
        let max_lag = (cfg.drift_max_lag_ms / envelope_ms).round() as usize;

        let length = buffer.length();
        let segment_frames = ((cfg.drift_segment_seconds * buffer.sample_rate() as f64) as u64)
            .min(length / cfg.drift_segments as u64);
        let min_points = (max_lag * MIN_ENVELOPE_LAG_RATIO).max(8);
        if segment_frames / envelope_frames as u64 <= min_points as u64 {
            return Ok(None);
        }

        let processor = WindowProcessor::new(envelope_frames);
        let mut segments = Vec::with_capacity(cfg.drift_segments);

        for i in 0..cfg.drift_segments {
            cancel.check()?;
            let center = ((i as f64 + 0.5) / cfg.drift_segments as f64 * length as f64) as u64;
            let start = center.saturating_sub(segment_frames / 2);
            let end = (start + segment_frames).min(length);

            let envelope = |ch: usize| -> AnalysisResult<Vec<f64>> {
                Ok(processor
                    .compute_range(buffer, ChannelMode::Single(ch), start..end, cancel)?
                    .iter()
                    .map(|w| w.rms_db.max(ENVELOPE_FLOOR_DB))
                    .collect())
            };
            let a = level_changes(&envelope(0)?);
            let b = level_changes(&envelope(1)?);
            if !has_variation(&a) || !has_variation(&b) {
                continue;
            }

            let (lag, correlation) = best_lag(&a, &b, max_lag);
            if correlation >= cfg.drift_min_correlation {
                segments.push(SegmentOffset {
                    time_seconds: buffer.frames_to_seconds(center),
                    offset_ms: lag as f64 * envelope_ms,
                    correlation,
                });
            }
        }

        if segments.len() < 2 {
            return Ok(None);
        }

        let drift_ms = segments[segments.len() - 1].offset_ms - segments[0].offset_ms;
        let points: Vec<(f64, f64)> = segments
            .iter()
            .map(|s| (s.time_seconds, s.offset_ms))
            .collect();
        let drift_ms_per_hour = LinearFit::fit(&points)
            .map(|fit| fit.slope * 3600.0)
            .unwrap_or(0.0);

        Ok(Some(SyncDriftEstimate {
            segments,
            drift_ms,
            drift_ms_per_hour,
        }))
    }
}

/// 相邻包络点的电平变化，限幅到 ±MAX_LEVEL_STEP_DB
fn level_changes(envelope_db: &[f64]) -> Vec<f64> {
    envelope_db
        .windows(2)
        .map(|pair| {
            (pair[1] - pair[0]).clamp(-MAX_LEVEL_STEP_DB, MAX_LEVEL_STEP_DB)
        })
        .collect()
}

/// 全零变化（静音片段）没有可对齐的结构
fn has_variation(changes: &[f64]) -> bool {
    changes.iter().any(|c| c.abs() > 1e-9)
}

/// 在 [-max_lag, max_lag] 内找使 corr(a[j], b[j+lag]) 最大的延迟
fn best_lag(a: &[f64], b: &[f64], max_lag: usize) -> (isize, f64) {
    let n = a.len().min(b.len());
    let max_lag = max_lag.min(n.saturating_sub(2)) as isize;
    let mut best = (0isize, f64::NEG_INFINITY);

    for lag in -max_lag..=max_lag {
        let (a_slice, b_slice) = if lag >= 0 {
            let lag = lag as usize;
            (&a[..n - lag], &b[lag..n])
        } else {
            let lag = (-lag) as usize;
            (&a[lag..n], &b[..n - lag])
        };
        let correlation = pearson(a_slice, b_slice);
        // 相同相关度时取绝对值更小的延迟
        if correlation > best.1 || (correlation == best.1 && lag.abs() < best.0.abs()) {
            best = (lag, correlation);
        }
    }

    best
}
