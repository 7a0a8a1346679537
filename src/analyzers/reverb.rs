//! 混响时间（RT60）估计
//!
//! 两个阶段：
//! 1. 起始点检测：短窗口（约21 ms）合并RMS，相邻窗口上升超过阈值且电平足够高于噪声底
//! 2. 衰减拟合：从起始点后的局部最大值开始跟踪衰减，直到接近噪声底、
//!    出现回升或超过最长时长；在 [峰值-5 dB, 峰值-35 dB] 区间做最小二乘直线拟合（T30风格）
//! 3. 短衰减细化：拟合区间内的窗口点数不足时，在同一衰减区间上
//!    用步长为窗口 1/8 的重叠窗口重新跟踪并拟合（干声棚 RT60 < 0.2 s）
//!
//! RT60 = -60 / 中位斜率。置信度 = min(1, 有效拟合数/目标数) × 平均 r²，
//! 对拟合数量与拟合质量都单调。没有有效拟合时返回 0 秒、0 置信度，不编造数值。

use crate::core::statistics::{LinearFit, median};
use crate::core::{ChannelMode, ReverbConfig, SampleBuffer, Window, WindowProcessor};
use crate::error::AnalysisResult;
use crate::processing::CancellationToken;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[cfg(debug_assertions)]
macro_rules! debug_reverb {
    ($($arg:tt)*) => {
        log::debug!(target: "reverb", $($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! debug_reverb {
    ($($arg:tt)*) => {};
}

/// RT60 解读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverbInterpretation {
    /// < 0.3 s
    Dry,
    /// < 0.6 s
    Moderate,
    /// < 1.0 s
    Reverberant,
    VeryReverberant,
    InsufficientData,
}

impl ReverbInterpretation {
    pub fn from_rt60(rt60_seconds: f64) -> Self {
        match rt60_seconds {
            t if t < 0.3 => ReverbInterpretation::Dry,
            t if t < 0.6 => ReverbInterpretation::Moderate,
            t if t < 1.0 => ReverbInterpretation::Reverberant,
            _ => ReverbInterpretation::VeryReverberant,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReverbInterpretation::Dry => "dry",
            ReverbInterpretation::Moderate => "moderate",
            ReverbInterpretation::Reverberant => "reverberant",
            ReverbInterpretation::VeryReverberant => "very_reverberant",
            ReverbInterpretation::InsufficientData => "insufficient_data",
        }
    }
}

/// 混响估计结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverbEstimate {
    pub rt60_seconds: f64,
    /// 置信度 [0, 1]
    pub confidence: f64,
    pub interpretation: ReverbInterpretation,
    pub onsets_detected: usize,
    pub decays_fitted: usize,
    /// 中位衰减斜率（dB/s，负值；无有效拟合时为0）
    pub median_decay_slope_db_per_s: f64,
    pub mean_fit_r2: f64,
    low_confidence: bool,
}

impl ReverbEstimate {
    fn insufficient(onsets_detected: usize) -> Self {
        Self {
            rt60_seconds: 0.0,
            confidence: 0.0,
            interpretation: ReverbInterpretation::InsufficientData,
            onsets_detected,
            decays_fitted: 0,
            median_decay_slope_db_per_s: 0.0,
            mean_fit_r2: 0.0,
            low_confidence: true,
        }
    }

    /// 置信度低于配置阈值（这种结果必须向用户显示，不能丢弃）
    #[inline]
    pub fn is_low_confidence(&self) -> bool {
        self.low_confidence
    }
}

pub struct ReverbEstimator {
    config: ReverbConfig,
}

impl ReverbEstimator {
    pub fn new(config: ReverbConfig) -> Self {
        Self { config }
    }

    /// 估计RT60
    ///
    /// `windows` 为 `buffer` 上的混响短窗口（合并声道），
    /// `effective_floor_db` 为被下限抬升后的噪声底。
    pub fn estimate(
        &self,
        buffer: &SampleBuffer,
        windows: &[Window],
        effective_floor_db: f64,
        cancel: &CancellationToken,
    ) -> AnalysisResult<ReverbEstimate> {
        let cfg = &self.config;
        let sample_rate = buffer.sample_rate();
        let onset_level_db = effective_floor_db + cfg.onset_min_above_floor_db;

        let mut onsets = 0usize;
        let mut fits: Vec<LinearFit> = Vec::new();
        let mut index = 1usize;

        while index < windows.len() {
            cancel.check()?;

            let previous = windows[index - 1].rms_db.max(effective_floor_db);
            let current = windows[index].rms_db;
            if current - previous > cfg.onset_rise_db && current >= onset_level_db {
                onsets += 1;
                let peak_index = local_maximum(windows, index);
                let (points, end_index) =
                    self.track_decay(windows, peak_index, effective_floor_db, sample_rate, cancel)?;
                let mut selected = self.fit_points(&points, windows[peak_index].rms_db);
                if selected.len() < cfg.min_fit_points {
                    let last = end_index.clamp(peak_index + 1, windows.len()) - 1;
                    let span = windows[peak_index].start_sample..windows[last].end_sample;
                    let frames = windows[peak_index].frames() as usize;
                    selected =
                        self.refined_fit_points(buffer, span, frames, effective_floor_db, cancel)?;
                }
                if let Some(fit) = self.fit_decay(&selected) {
                    fits.push(fit);
                }
                index = end_index.max(index + 1);
            } else {
                index += 1;
            }
        }

        debug_reverb!(
            "混响估计: windows={}, onsets={}, fits={}",
            windows.len(),
            onsets,
            fits.len()
        );

        let slopes: Vec<f64> = fits.iter().map(|f| f.slope).collect();
        let Some(median_slope) = median(&slopes) else {
            return Ok(ReverbEstimate::insufficient(onsets));
        };

        let mean_r2 = fits.iter().map(|f| f.r_squared).sum::<f64>() / fits.len() as f64;
        let count_factor = (fits.len() as f64 / cfg.target_decays as f64).min(1.0);
        let confidence = (count_factor * mean_r2).clamp(0.0, 1.0);
        let rt60_seconds = (-60.0 / median_slope).max(0.0);

        Ok(ReverbEstimate {
            rt60_seconds,
            confidence,
            interpretation: ReverbInterpretation::from_rt60(rt60_seconds),
            onsets_detected: onsets,
            decays_fitted: fits.len(),
            median_decay_slope_db_per_s: median_slope,
            mean_fit_r2: mean_r2,
            low_confidence: confidence < cfg.low_confidence,
        })
    }

    /// 从峰值窗口开始收集衰减点 (中心时间, dB)，返回点集与衰减结束后的窗口索引
    fn track_decay(
        &self,
        windows: &[Window],
        peak_index: usize,
        effective_floor_db: f64,
        sample_rate: u32,
        cancel: &CancellationToken,
    ) -> AnalysisResult<(Vec<(f64, f64)>, usize)> {
        let cfg = &self.config;
        let stop_db = effective_floor_db + cfg.decay_stop_margin_db;
        let start_time = windows[peak_index].center_time(sample_rate);

        let mut points = Vec::new();
        let mut lowest = windows[peak_index].rms_db;
        let mut index = peak_index;

        while index < windows.len() {
            cancel.check()?;
            let window = &windows[index];
            let level = window.rms_db;
            let time = window.center_time(sample_rate);

            if time - start_time > cfg.max_decay_seconds || level > lowest + cfg.decay_rerise_db {
                break;
            }
            if level <= stop_db {
                index += 1;
                break;
            }

            points.push((time, level));
            lowest = lowest.min(level);
            index += 1;
        }

        Ok((points, index))
    }

    /// T30风格区间：只保留 [峰值-start, 峰值-start-range] 之间的点
    fn fit_points(&self, points: &[(f64, f64)], peak_db: f64) -> Vec<(f64, f64)> {
        let cfg = &self.config;
        let upper = peak_db - cfg.decay_fit_start_db;
        let lower = upper - cfg.decay_fit_range_db;
        points
            .iter()
            .copied()
            .filter(|&(_, db)| db <= upper && db >= lower)
            .collect()
    }

    /// 在衰减区间上用重叠窗口重新跟踪，返回拟合区间内的点
    fn refined_fit_points(
        &self,
        buffer: &SampleBuffer,
        span: Range<u64>,
        window_frames: usize,
        effective_floor_db: f64,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Vec<(f64, f64)>> {
        let hop = window_frames / self.config.refine_hop_divisor;
        let fine: Vec<Window> = WindowProcessor::with_hop(window_frames, hop)
            .compute_range(buffer, ChannelMode::Combined, span, cancel)?
            .into_iter()
            .filter(|w| w.frames() as usize == window_frames)
            .collect();
        if fine.is_empty() {
            return Ok(Vec::new());
        }

        let peak_index = local_maximum(&fine, 0);
        let (points, _) = self.track_decay(
            &fine,
            peak_index,
            effective_floor_db,
            buffer.sample_rate(),
            cancel,
        )?;
        debug_reverb!(
            "细化衰减: fine_windows={}, points={}",
            fine.len(),
            points.len()
        );
        Ok(self.fit_points(&points, fine[peak_index].rms_db))
    }

    fn fit_decay(&self, selected: &[(f64, f64)]) -> Option<LinearFit> {
        let cfg = &self.config;
        if selected.len() < cfg.min_fit_points {
            return None;
        }
        let fit = LinearFit::fit(selected)?;
        (fit.slope < 0.0 && fit.r_squared >= cfg.min_fit_r2).then_some(fit)
    }
}

/// 起始点之后第一个局部最大值
fn local_maximum(windows: &[Window], onset: usize) -> usize {
    let mut index = onset;
    while index + 1 < windows.len() && windows[index + 1].rms_db >= windows[index].rms_db {
        index += 1;
    }
    index
}
