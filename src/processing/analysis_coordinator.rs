//! 分析协调器（结果聚合）
//!
//! 按依赖顺序编排各分析器，串联取消与进度，合并为统一的 `AudioMetrics`：
//!
//! 校验 → 峰值 → 窗口 → 噪声底 → 静音分段 → 削波 → 混响（实验性） → 声道关系
//!
//! 每个文件使用一个新的 `AudioAnalyzer`（`analyze` 消耗自身），
//! 分析器之间不共享可变状态，多个实例可以在不同线程上并发运行。

use super::cancellation::CancellationToken;
use super::progress::{ProgressCallback, ProgressReporter, stage};
use crate::analyzers::{
    ClippingAnalyzer, ClippingResult, NoiseFloorAnalyzer, NoiseFloorEstimate, PeakAnalyzer,
    PeakResult, ReverbEstimate, ReverbEstimator, SegmentationResult, SilenceSegmenter,
    StereoAnalyzer, StereoRelationship,
};
use crate::core::{AnalysisOptions, ChannelMode, PeakMode, SampleBuffer, WindowCache};
use crate::error::{AnalysisError, AnalysisResult};
use crate::utils::SafetyGuard;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(debug_assertions)]
macro_rules! debug_coordinator {
    ($($arg:tt)*) => {
        log::debug!(target: "coordinator", $($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! debug_coordinator {
    ($($arg:tt)*) => {};
}

/// 各阶段完成时上报的进度
mod milestones {
    pub const PEAK: f64 = 0.10;
    pub const WINDOWS: f64 = 0.30;
    pub const NOISE_FLOOR: f64 = 0.35;
    pub const SEGMENTATION: f64 = 0.45;
    pub const CLIPPING: f64 = 0.60;
    pub const REVERB: f64 = 0.75;
    pub const STEREO: f64 = 0.95;
}

/// 分析警告："带着缺陷完成分析"而非"分析失败"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// 零帧输入，所有指标为哨兵值
    EmptyBuffer,
    /// 快速峰值模式的结果是近似值
    FastPeakMode,
    /// 含 NaN/inf 样本（按0计入）
    NonFiniteSamples { count: u64 },
    /// 混响估计置信度低
    LowReverbConfidence { confidence: f64 },
    /// 削波区间列表被截断（计数保持精确）
    ClippingRegionsTruncated { reported: usize, total: usize },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::EmptyBuffer => write!(f, "音频长度为0，指标均为哨兵值"),
            AnalysisWarning::FastPeakMode => {
                write!(f, "峰值使用快速模式估计（近似值，合规测量请使用精确模式）")
            }
            AnalysisWarning::NonFiniteSamples { count } => {
                write!(f, "检测到{count}个非有限样本，已按0处理")
            }
            AnalysisWarning::LowReverbConfidence { confidence } => {
                write!(f, "混响估计置信度低({confidence:.2})")
            }
            AnalysisWarning::ClippingRegionsTruncated { reported, total } => {
                write!(f, "削波区间过多，仅报告{reported}/{total}个")
            }
        }
    }
}

/// 统一质量指标（每次分析新建，返回后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetrics {
    pub sample_rate: u32,
    pub channel_count: usize,
    /// 帧数
    pub length: u64,
    pub duration_seconds: f64,
    pub peak: PeakResult,
    pub noise_floor: NoiseFloorEstimate,
    pub segmentation: SegmentationResult,
    pub clipping: ClippingResult,
    /// 仅在启用实验性分析时计算
    pub reverb: Option<ReverbEstimate>,
    pub stereo: StereoRelationship,
    pub experimental_enabled: bool,
    pub warnings: Vec<AnalysisWarning>,
}

impl AudioMetrics {
    /// JSON输出（`-inf` 写为 `"-Infinity"`）
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// 单文件分析器
///
/// ```rust
/// use macinmeter_voice_qc::{AnalysisOptions, AudioAnalyzer, SampleBuffer};
///
/// let buffer = SampleBuffer::new(48000, vec![vec![0.0; 48000], vec![0.0; 48000]]).unwrap();
/// let metrics = AudioAnalyzer::new(AnalysisOptions::default())
///     .analyze(&buffer)
///     .unwrap();
/// assert_eq!(metrics.noise_floor.overall_db, f64::NEG_INFINITY);
/// assert!(metrics.segmentation.is_entirely_silent);
/// ```
pub struct AudioAnalyzer<'a> {
    options: AnalysisOptions,
    progress: ProgressReporter<'a>,
    cancel: CancellationToken,
}

impl<'a> AudioAnalyzer<'a> {
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            options,
            progress: ProgressReporter::silent(),
            cancel: CancellationToken::new(),
        }
    }

    /// 设置进度回调 `callback(stage, fraction)`
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str, f64) + Send + 'a,
    {
        let callback: ProgressCallback<'a> = Box::new(callback);
        self.progress = ProgressReporter::new(Some(callback));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[inline]
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// 分析一个缓冲区
    ///
    /// 取消时返回 `Err(Cancelled)`，已完成的部分结果全部丢弃。
    pub fn analyze(mut self, buffer: &SampleBuffer) -> AnalysisResult<AudioMetrics> {
        match self.run(buffer) {
            Ok(metrics) => Ok(metrics),
            Err(AnalysisError::Cancelled) => {
                log::info!(
                    "分析已取消（进度 {:.0}%）",
                    self.progress.last_fraction() * 100.0
                );
                Err(AnalysisError::Cancelled)
            }
            Err(err) => {
                log::warn!("分析失败: {err}");
                Err(err)
            }
        }
    }

    fn run(&mut self, buffer: &SampleBuffer) -> AnalysisResult<AudioMetrics> {
        let options = self.options;
        let config = options.config;
        let cancel = self.cancel.clone();
        let sample_rate = buffer.sample_rate();
        let mut warnings = Vec::new();

        self.progress.report(stage::VALIDATING, 0.0);
        config.validate()?;

        let analysis_frames = buffer.ms_to_frames(config.analysis_window_ms);
        let inspection = SafetyGuard::inspect_buffer(buffer, analysis_frames, &cancel)?;
        if inspection.frames == 0 {
            warnings.push(AnalysisWarning::EmptyBuffer);
        }
        if inspection.non_finite_samples > 0 {
            warnings.push(AnalysisWarning::NonFiniteSamples {
                count: inspection.non_finite_samples,
            });
        }

        debug_coordinator!(
            "分析开始: rate={}, channels={}, frames={}, window={}帧, peak_mode={}, experimental={}",
            sample_rate,
            inspection.channel_count,
            inspection.frames,
            analysis_frames,
            options.peak_mode.name(),
            options.enable_experimental
        );

        let peak = PeakAnalyzer::new(options.peak_mode, analysis_frames).analyze(buffer, &cancel)?;
        if options.peak_mode == PeakMode::Fast {
            warnings.push(AnalysisWarning::FastPeakMode);
        }
        self.progress.report(stage::PEAK, milestones::PEAK);

        let mut cache = WindowCache::new();
        let per_channel = cache.per_channel(buffer, analysis_frames, &cancel)?;
        let combined = cache.get(buffer, analysis_frames, ChannelMode::Combined, &cancel)?;
        self.progress.report(stage::WINDOWS, milestones::WINDOWS);

        let noise_floor = NoiseFloorAnalyzer::new(config.noise_floor)
            .analyze(&combined, &per_channel);
        SafetyGuard::validate_calculation(noise_floor.overall_db, "噪声底估计")?;
        self.progress.report(stage::NOISE_FLOOR, milestones::NOISE_FLOOR);

        let segmentation = SilenceSegmenter::new(config.segmentation).segment(
            &combined,
            noise_floor.overall_db,
            sample_rate,
            &cancel,
        )?;
        self.progress.report(stage::SEGMENTATION, milestones::SEGMENTATION);

        let clipping =
            ClippingAnalyzer::new(config.clipping, analysis_frames).analyze(buffer, &cancel)?;
        if clipping.regions_truncated {
            warnings.push(AnalysisWarning::ClippingRegionsTruncated {
                reported: clipping.regions.len(),
                total: clipping.total_regions,
            });
        }
        self.progress.report(stage::CLIPPING, milestones::CLIPPING);

        let reverb = if options.enable_experimental {
            let reverb_frames = buffer.ms_to_frames(config.reverb_window_ms);
            let windows = cache.get(buffer, reverb_frames, ChannelMode::Combined, &cancel)?;
            let estimate = ReverbEstimator::new(config.reverb).estimate(
                buffer,
                &windows,
                segmentation.thresholds.effective_floor_db,
                &cancel,
            )?;
            SafetyGuard::validate_calculation(estimate.rt60_seconds, "混响估计")?;
            if estimate.is_low_confidence() {
                warnings.push(AnalysisWarning::LowReverbConfidence {
                    confidence: estimate.confidence,
                });
            }
            self.progress.report(stage::REVERB, milestones::REVERB);
            Some(estimate)
        } else {
            None
        };

        let stereo = StereoAnalyzer::new(config.stereo, config.segmentation, analysis_frames)
            .analyze(buffer, &per_channel, &noise_floor.per_channel_db, &cancel)?;
        SafetyGuard::validate_calculation(stereo.correlation_coefficient, "声道相关")?;
        self.progress.report(stage::STEREO, milestones::STEREO);

        cancel.check()?;
        self.progress.report(stage::COMPLETE, 1.0);

        debug_coordinator!(
            "分析完成: floor={:.1}dB, speech_ratio={:.3}, clip={}, stereo={}, warnings={}",
            noise_floor.overall_db,
            segmentation.speech_ratio,
            clipping.severity.name(),
            stereo.stereo_type.name(),
            warnings.len()
        );

        Ok(AudioMetrics {
            sample_rate,
            channel_count: inspection.channel_count,
            length: inspection.frames,
            duration_seconds: buffer.duration_seconds(),
            peak,
            noise_floor,
            segmentation,
            clipping,
            reverb,
            stereo,
            experimental_enabled: options.enable_experimental,
            warnings,
        })
    }
}
