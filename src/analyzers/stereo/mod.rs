//! 声道关系分析
//!
//! 对所有声道对计算全信号皮尔逊相关，按主声道对 (0, 1) 分类：
//! 1. 两声道都是数字静音，或相关系数 ≥ 0.999 → DualMono
//! 2. 恰好一个声道整体电平低于 -90 dB → Mono
//! 3. 相关系数 < 0.5 且能量交替比例 ≥ 0.5 → ConversationalStereo
//! 4. 其他 → TrueStereo
//!
//! 单声道输入直接为 Mono（相关系数 1）。串音与对话重叠只在
//! ConversationalStereo 时计算。

pub mod bleed;
pub mod drift;
pub mod overlap;

pub use bleed::{ChannelBleed, MicBleedAnalysis, analyze_bleed};
pub use drift::{DriftEstimator, SegmentOffset, SyncDriftEstimate};
pub use overlap::{ConversationalAnalysis, OverlapStats, detect_overlap};

use crate::core::statistics::{PearsonAccumulator, pearson};
use crate::core::window::amplitude_to_db;
use crate::core::{SampleBuffer, SegmentationConfig, StereoConfig, Window};
use crate::error::AnalysisResult;
use crate::processing::CancellationToken;
use crate::utils::db_serde;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[cfg(debug_assertions)]
macro_rules! debug_stereo {
    ($($arg:tt)*) => {
        log::debug!(target: "stereo", $($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! debug_stereo {
    ($($arg:tt)*) => {};
}

/// 立体声类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoType {
    Mono,
    TrueStereo,
    DualMono,
    ConversationalStereo,
}

impl StereoType {
    pub fn name(&self) -> &'static str {
        match self {
            StereoType::Mono => "mono",
            StereoType::TrueStereo => "true_stereo",
            StereoType::DualMono => "dual_mono",
            StereoType::ConversationalStereo => "conversational_stereo",
        }
    }
}

/// 声道对相关系数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairCorrelation {
    pub channel_a: usize,
    pub channel_b: usize,
    pub correlation: f64,
}

/// 声道关系分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoRelationship {
    pub stereo_type: StereoType,
    /// 主声道对 (0, 1) 的样本相关系数
    pub correlation_coefficient: f64,
    /// 主声道对窗口RMS包络的相关系数
    pub envelope_correlation: f64,
    /// 活动窗口中一方主导的比例
    pub alternation_ratio: f64,
    pub pair_correlations: Vec<PairCorrelation>,
    /// 各声道整体RMS（dBFS）
    #[serde(with = "db_serde::vec")]
    pub channel_rms_db: Vec<f64>,
    pub mic_bleed: Option<MicBleedAnalysis>,
    pub conversational_analysis: Option<ConversationalAnalysis>,
}

impl StereoRelationship {
    fn single_channel(channel_rms_db: Vec<f64>) -> Self {
        Self {
            stereo_type: StereoType::Mono,
            correlation_coefficient: 1.0,
            envelope_correlation: 1.0,
            alternation_ratio: 0.0,
            pair_correlations: Vec::new(),
            channel_rms_db,
            mic_bleed: None,
            conversational_analysis: None,
        }
    }
}

pub struct StereoAnalyzer {
    config: StereoConfig,
    segmentation: SegmentationConfig,
    block_frames: usize,
}

impl StereoAnalyzer {
    /// `segmentation` 提供语音活动阈值（噪声底 + 余量）
    pub fn new(
        config: StereoConfig,
        segmentation: SegmentationConfig,
        block_frames: usize,
    ) -> Self {
        Self {
            config,
            segmentation,
            block_frames: block_frames.max(1),
        }
    }

    /// 分析声道关系
    ///
    /// `per_channel_windows` / `per_channel_floor_db` 与缓冲区声道一一对应。
    pub fn analyze(
        &self,
        buffer: &SampleBuffer,
        per_channel_windows: &[Rc<[Window]>],
        per_channel_floor_db: &[f64],
        cancel: &CancellationToken,
    ) -> AnalysisResult<StereoRelationship> {
        let channel_rms = per_channel_windows
            .iter()
            .map(|w| overall_rms(w))
            .collect::<Vec<f64>>();
        let channel_rms_db: Vec<f64> = channel_rms
            .iter()
            .map(|&r| amplitude_to_db(r))
            .collect();

        if buffer.channel_count() < 2 || per_channel_windows.len() < 2 {
            return Ok(StereoRelationship::single_channel(channel_rms_db));
        }

        let pair_correlations = self.pair_correlations(buffer, cancel)?;
        let correlation = pair_correlations
            .first()
            .map(|p| p.correlation)
            .unwrap_or(1.0);

        let primary: [&[Window]; 2] = [&per_channel_windows[0], &per_channel_windows[1]];
        let thresholds = [
            self.active_threshold(per_channel_floor_db.first().copied()),
            self.active_threshold(per_channel_floor_db.get(1).copied()),
        ];

        let envelope_correlation = {
            let a: Vec<f64> = primary[0].iter().map(|w| w.rms).collect();
            let b: Vec<f64> = primary[1].iter().map(|w| w.rms).collect();
            pearson(&a, &b)
        };
        let alternation_ratio = self.alternation_ratio(primary, thresholds);

        let stereo_type = self.classify(
            correlation,
            [channel_rms[0], channel_rms[1]],
            [channel_rms_db[0], channel_rms_db[1]],
            alternation_ratio,
        );

        debug_stereo!(
            "声道关系: type={}, r={:.4}, env_r={:.3}, alternation={:.3}",
            stereo_type.name(),
            correlation,
            envelope_correlation,
            alternation_ratio
        );

        let (mic_bleed, conversational_analysis) =
            if stereo_type == StereoType::ConversationalStereo {
                let (bleed, conversation) =
                    self.conversational_details(buffer, primary, thresholds, cancel)?;
                (Some(bleed), Some(conversation))
            } else {
                (None, None)
            };

        Ok(StereoRelationship {
            stereo_type,
            correlation_coefficient: correlation,
            envelope_correlation,
            alternation_ratio,
            pair_correlations,
            channel_rms_db,
            mic_bleed,
            conversational_analysis,
        })
    }

    /// 对话立体声的串音、重叠与同步漂移，每一步之前轮询取消
    fn conversational_details(
        &self,
        buffer: &SampleBuffer,
        primary: [&[Window]; 2],
        thresholds: [f64; 2],
        cancel: &CancellationToken,
    ) -> AnalysisResult<(MicBleedAnalysis, ConversationalAnalysis)> {
        cancel.check()?;
        let bleed = analyze_bleed(
            primary,
            thresholds,
            self.segmentation.silence_floor_clamp_db,
            &self.config,
        );
        cancel.check()?;
        let overlap = detect_overlap(
            primary,
            thresholds,
            self.config.overlap_level_tolerance_db,
            buffer.sample_rate(),
        );
        cancel.check()?;
        let drift = DriftEstimator::new(&self.config).estimate(buffer, cancel)?;
        Ok((bleed, overlap.with_drift(drift)))
    }

    fn classify(
        &self,
        correlation: f64,
        rms: [f64; 2],
        rms_db: [f64; 2],
        alternation_ratio: f64,
    ) -> StereoType {
        let cfg = &self.config;
        let both_silent = rms[0] == 0.0 && rms[1] == 0.0;
        let silent_channels = rms_db
            .iter()
            .filter(|&&db| db < cfg.silent_channel_db)
            .count();

        if both_silent || correlation >= cfg.dual_mono_correlation {
            StereoType::DualMono
        } else if silent_channels == 1 {
            StereoType::Mono
        } else if correlation < cfg.conversational_max_correlation
            && alternation_ratio >= cfg.conversational_min_alternation
        {
            StereoType::ConversationalStereo
        } else {
            StereoType::TrueStereo
        }
    }

    fn active_threshold(&self, floor_db: Option<f64>) -> f64 {
        self.segmentation
            .effective_floor_db(floor_db.unwrap_or(f64::NEG_INFINITY))
            + self.segmentation.speech_margin_db
    }

    /// 任一声道活动的窗口中，一方电平领先至少 `dominance_db` 的比例
    fn alternation_ratio(&self, channels: [&[Window]; 2], thresholds: [f64; 2]) -> f64 {
        let clamp = self.segmentation.silence_floor_clamp_db;
        let mut active = 0usize;
        let mut dominant = 0usize;

        for (a, b) in channels[0].iter().zip(channels[1]) {
            if a.rms_db > thresholds[0] || b.rms_db > thresholds[1] {
                active += 1;
                if (a.rms_db.max(clamp) - b.rms_db.max(clamp)).abs() >= self.config.dominance_db {
                    dominant += 1;
                }
            }
        }

        if active == 0 {
            0.0
        } else {
            dominant as f64 / active as f64
        }
    }

    /// 所有声道对的全信号相关系数（一次扫描，按块轮询取消）
    fn pair_correlations(
        &self,
        buffer: &SampleBuffer,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Vec<PairCorrelation>> {
        let channels = buffer.channels();
        let pairs: Vec<(usize, usize)> = (0..channels.len())
            .flat_map(|a| ((a + 1)..channels.len()).map(move |b| (a, b)))
            .collect();
        let mut accumulators = vec![PearsonAccumulator::new(); pairs.len()];

        let length = buffer.length() as usize;
        let mut start = 0usize;
        while start < length {
            cancel.check()?;
            let end = (start + self.block_frames).min(length);
            for (&(a, b), acc) in pairs.iter().zip(accumulators.iter_mut()) {
                for (&x, &y) in channels[a][start..end].iter().zip(&channels[b][start..end]) {
                    acc.add(finite_or_zero(x), finite_or_zero(y));
                }
            }
            start = end;
        }

        Ok(pairs
            .into_iter()
            .zip(accumulators)
            .map(|((channel_a, channel_b), acc)| PairCorrelation {
                channel_a,
                channel_b,
                correlation: acc.correlation(),
            })
            .collect())
    }
}

#[inline]
fn finite_or_zero(sample: f32) -> f64 {
    if sample.is_finite() {
        sample as f64
    } else {
        0.0
    }
}

/// 由窗口RMS还原整体RMS（按帧数加权）
fn overall_rms(windows: &[Window]) -> f64 {
    let (sum, frames) = windows.iter().fold((0.0, 0u64), |(sum, frames), w| {
        (sum + w.rms * w.rms * w.frames() as f64, frames + w.frames())
    });
    if frames == 0 {
        0.0
    } else {
        (sum / frames as f64).sqrt()
    }
}
