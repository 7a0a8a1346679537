//! 静音/语音分段器
//!
//! 在公共分析窗口（合并声道）上运行两态状态机 {Silence, Speech}。
//!
//! ## 核心语义
//!
//! - 有效噪声底 `floor_eff = max(floor, silence_floor_clamp_db)`，
//!   噪声底为 `-inf` 时阈值仍然有限
//! - 进入语音：`rms_db > floor_eff + margin`
//! - 离开语音：`rms_db < floor_eff + margin - hysteresis`（迟滞防止阈值附近抖动）
//! - 同状态的连续窗口合并为一个区间
//! - 短于最小时长的区间视为测量噪声，回灌到相邻状态后重新合并：
//!   先回灌短语音，再回灌短静音
//!
//! 首/尾静音与中段静音分开报告。全静音文件得到一个覆盖全长的静音区间，
//! 按首部静音报告并标记 `is_entirely_silent`。

use crate::core::region::total_duration;
use crate::core::{Region, SegmentationConfig, Window};
use crate::error::AnalysisResult;
use crate::processing::CancellationToken;
use crate::utils::db_serde;
use serde::{Deserialize, Serialize};

#[cfg(debug_assertions)]
macro_rules! debug_segmenter {
    ($($arg:tt)*) => {
        log::debug!(target: "segmenter", $($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! debug_segmenter {
    ($($arg:tt)*) => {};
}

/// 分段器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    Silence,
    Speech,
}

/// 同状态的连续帧区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    state: SegmentState,
    start_frame: u64,
    end_frame: u64,
}

impl Run {
    #[inline]
    fn frames(&self) -> u64 {
        self.end_frame - self.start_frame
    }
}

/// 实际使用的判定阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationThresholds {
    /// 原始噪声底（可能为 -inf）
    #[serde(with = "db_serde")]
    pub noise_floor_db: f64,
    /// 被下限抬升后的有效噪声底
    pub effective_floor_db: f64,
    pub enter_speech_db: f64,
    pub exit_speech_db: f64,
}

impl SegmentationThresholds {
    pub fn new(noise_floor_db: f64, config: &SegmentationConfig) -> Self {
        let effective_floor_db = config.effective_floor_db(noise_floor_db);
        let enter_speech_db = effective_floor_db + config.speech_margin_db;
        Self {
            noise_floor_db,
            effective_floor_db,
            enter_speech_db,
            exit_speech_db: enter_speech_db - config.hysteresis_db,
        }
    }
}

/// 分段结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub silence_regions: Vec<Region>,
    pub speech_regions: Vec<Region>,
    /// 不含首尾的中段静音
    pub interior_silence_regions: Vec<Region>,
    pub leading_silence_seconds: f64,
    pub trailing_silence_seconds: f64,
    /// 语音时长占总时长比例（0-1）
    pub speech_ratio: f64,
    pub is_entirely_silent: bool,
    pub thresholds: SegmentationThresholds,
}

impl SegmentationResult {
    pub fn total_silence_seconds(&self) -> f64 {
        total_duration(&self.silence_regions)
    }

    pub fn total_speech_seconds(&self) -> f64 {
        total_duration(&self.speech_regions)
    }
}

pub struct SilenceSegmenter {
    config: SegmentationConfig,
}

impl SilenceSegmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// 对合并窗口分段
    ///
    /// `windows` 须连续覆盖 [0, total_frames)。
    pub fn segment(
        &self,
        windows: &[Window],
        noise_floor_db: f64,
        sample_rate: u32,
        cancel: &CancellationToken,
    ) -> AnalysisResult<SegmentationResult> {
        let thresholds = SegmentationThresholds::new(noise_floor_db, &self.config);

        let mut runs = self.classify(windows, &thresholds, cancel)?;
        let raw_runs = runs.len();

        let min_speech = ms_to_frames(self.config.min_speech_ms, sample_rate);
        let min_silence = ms_to_frames(self.config.min_silence_ms, sample_rate);
        absorb_short_runs(&mut runs, SegmentState::Speech, min_speech);
        absorb_short_runs(&mut runs, SegmentState::Silence, min_silence);

        debug_segmenter!(
            "分段: windows={}, 原始区间={}, 回灌后区间={}, enter={:.1}dB, exit={:.1}dB",
            windows.len(),
            raw_runs,
            runs.len(),
            thresholds.enter_speech_db,
            thresholds.exit_speech_db
        );

        Ok(self.build_result(&runs, thresholds, sample_rate))
    }

    /// 迟滞状态机，逐窗口分类并合并为连续区间
    fn classify(
        &self,
        windows: &[Window],
        thresholds: &SegmentationThresholds,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Vec<Run>> {
        let mut runs: Vec<Run> = Vec::new();
        let mut state = SegmentState::Silence;

        for window in windows {
            cancel.check()?;

            state = match state {
                SegmentState::Silence if window.rms_db > thresholds.enter_speech_db => {
                    SegmentState::Speech
                }
                SegmentState::Speech if window.rms_db < thresholds.exit_speech_db => {
                    SegmentState::Silence
                }
                unchanged => unchanged,
            };

            match runs.last_mut() {
                Some(last) if last.state == state => last.end_frame = window.end_sample,
                _ => runs.push(Run {
                    state,
                    start_frame: window.start_sample,
                    end_frame: window.end_sample,
                }),
            }
        }

        Ok(runs)
    }

    fn build_result(
        &self,
        runs: &[Run],
        thresholds: SegmentationThresholds,
        sample_rate: u32,
    ) -> SegmentationResult {
        let to_region =
            |run: &Run| Region::from_frames(run.start_frame, run.end_frame, sample_rate, None);

        let silence_regions: Vec<Region> = runs
            .iter()
            .filter(|r| r.state == SegmentState::Silence)
            .filter_map(to_region)
            .collect();
        let speech_regions: Vec<Region> = runs
            .iter()
            .filter(|r| r.state == SegmentState::Speech)
            .filter_map(to_region)
            .collect();

        let is_entirely_silent = speech_regions.is_empty();
        let last_index = runs.len().saturating_sub(1);

        let interior_silence_regions: Vec<Region> = runs
            .iter()
            .enumerate()
            .filter(|(i, r)| {
                r.state == SegmentState::Silence && *i != 0 && *i != last_index
            })
            .filter_map(|(_, r)| to_region(r))
            .collect();

        let seconds = |run: &Run| run.frames() as f64 / sample_rate as f64;
        let leading_silence_seconds = match runs.first() {
            Some(run) if run.state == SegmentState::Silence => seconds(run),
            _ => 0.0,
        };
        // 全静音时唯一的区间只计入首部静音
        let trailing_silence_seconds = match runs.last() {
            Some(run) if run.state == SegmentState::Silence && runs.len() > 1 => seconds(run),
            _ => 0.0,
        };

        let total_frames = runs.last().map(|r| r.end_frame).unwrap_or(0)
            - runs.first().map(|r| r.start_frame).unwrap_or(0);
        let speech_frames: u64 = runs
            .iter()
            .filter(|r| r.state == SegmentState::Speech)
            .map(Run::frames)
            .sum();
        let speech_ratio = if total_frames > 0 {
            speech_frames as f64 / total_frames as f64
        } else {
            0.0
        };

        SegmentationResult {
            silence_regions,
            speech_regions,
            interior_silence_regions,
            leading_silence_seconds,
            trailing_silence_seconds,
            speech_ratio,
            is_entirely_silent,
            thresholds,
        }
    }
}

#[inline]
fn ms_to_frames(ms: f64, sample_rate: u32) -> u64 {
    (ms * sample_rate as f64 / 1000.0).round().max(0.0) as u64
}

/// 把指定状态中短于 `min_frames` 的区间翻转为相反状态，然后合并相邻同状态区间
///
/// 只有一个区间时保持不变（整段文件没有可回灌的邻居）。
fn absorb_short_runs(runs: &mut Vec<Run>, target: SegmentState, min_frames: u64) {
    if runs.len() <= 1 || min_frames == 0 {
        return;
    }

    let flipped = match target {
        SegmentState::Speech => SegmentState::Silence,
        SegmentState::Silence => SegmentState::Speech,
    };
    for run in runs.iter_mut() {
        if run.state == target && run.frames() < min_frames {
            run.state = flipped;
        }
    }

    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs.drain(..) {
        match merged.last_mut() {
            Some(last) if last.state == run.state => last.end_frame = run.end_frame,
            _ => merged.push(run),
        }
    }
    *runs = merged;
}
