//! 分析配置
//!
//! 全部阈值显式枚举在 `AnalysisConfig` 中，默认值来自 `core::constants`。
//! 每次分析通过 `AnalysisOptions` 显式传入配置，不依赖任何环境全局状态。

use super::constants;
use crate::error::{AnalysisResult, invalid_input};
use serde::{Deserialize, Serialize};

/// 峰值扫描模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakMode {
    /// 逐样本扫描，合规测量必须使用
    #[default]
    Accurate,
    /// 固定步长抽样扫描（近似值）
    Fast,
}

impl PeakMode {
    /// 扫描步长
    #[inline]
    pub fn stride(&self) -> usize {
        match self {
            PeakMode::Accurate => 1,
            PeakMode::Fast => constants::peak::FAST_MODE_STRIDE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PeakMode::Accurate => "accurate",
            PeakMode::Fast => "fast",
        }
    }
}

/// 噪声底估计配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseFloorConfig {
    /// 低分位（0-100，最近秩）
    pub percentile: f64,
}

impl Default for NoiseFloorConfig {
    fn default() -> Self {
        Self {
            percentile: constants::noise_floor::PERCENTILE,
        }
    }
}

/// 静音/语音分段配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub speech_margin_db: f64,
    pub hysteresis_db: f64,
    pub silence_floor_clamp_db: f64,
    pub min_silence_ms: f64,
    pub min_speech_ms: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        use constants::segmentation::*;
        Self {
            speech_margin_db: SPEECH_MARGIN_DB,
            hysteresis_db: HYSTERESIS_DB,
            silence_floor_clamp_db: SILENCE_FLOOR_CLAMP_DB,
            min_silence_ms: MIN_SILENCE_MS,
            min_speech_ms: MIN_SPEECH_MS,
        }
    }
}

impl SegmentationConfig {
    /// 判定用的有效噪声底（-inf 被抬升到下限）
    #[inline]
    pub fn effective_floor_db(&self, floor_db: f64) -> f64 {
        floor_db.max(self.silence_floor_clamp_db)
    }
}

/// 削波检测配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClippingConfig {
    pub threshold: f32,
    pub plosive_max_ms: f64,
    pub plosive_warning_count: usize,
    pub max_reported_regions: usize,
}

impl Default for ClippingConfig {
    fn default() -> Self {
        use constants::clipping::*;
        Self {
            threshold: THRESHOLD,
            plosive_max_ms: PLOSIVE_MAX_MS,
            plosive_warning_count: PLOSIVE_WARNING_COUNT,
            max_reported_regions: MAX_REPORTED_REGIONS,
        }
    }
}

/// 混响估计配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    pub onset_rise_db: f64,
    pub onset_min_above_floor_db: f64,
    pub decay_fit_start_db: f64,
    pub decay_fit_range_db: f64,
    pub decay_stop_margin_db: f64,
    pub decay_rerise_db: f64,
    pub max_decay_seconds: f64,
    pub min_fit_points: usize,
    pub refine_hop_divisor: usize,
    pub min_fit_r2: f64,
    pub target_decays: usize,
    pub low_confidence: f64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        use constants::reverb::*;
        Self {
            onset_rise_db: ONSET_RISE_DB,
            onset_min_above_floor_db: ONSET_MIN_ABOVE_FLOOR_DB,
            decay_fit_start_db: DECAY_FIT_START_DB,
            decay_fit_range_db: DECAY_FIT_RANGE_DB,
            decay_stop_margin_db: DECAY_STOP_MARGIN_DB,
            decay_rerise_db: DECAY_RERISE_DB,
            max_decay_seconds: MAX_DECAY_SECONDS,
            min_fit_points: MIN_FIT_POINTS,
            refine_hop_divisor: REFINE_HOP_DIVISOR,
            min_fit_r2: MIN_FIT_R2,
            target_decays: TARGET_DECAYS,
            low_confidence: LOW_CONFIDENCE,
        }
    }
}

/// 声道关系配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    pub dual_mono_correlation: f64,
    pub silent_channel_db: f64,
    pub conversational_max_correlation: f64,
    pub conversational_min_alternation: f64,
    pub dominance_db: f64,
    pub bleed_correlation_threshold: f64,
    pub bleed_max_isolation_db: f64,
    pub bleed_min_windows: usize,
    pub overlap_level_tolerance_db: f64,
    pub drift_envelope_ms: f64,
    pub drift_max_lag_ms: f64,
    pub drift_segments: usize,
    pub drift_segment_seconds: f64,
    pub drift_min_correlation: f64,
}

impl Default for StereoConfig {
    fn default() -> Self {
        use constants::stereo::*;
        Self {
            dual_mono_correlation: DUAL_MONO_CORRELATION,
            silent_channel_db: SILENT_CHANNEL_DB,
            conversational_max_correlation: CONVERSATIONAL_MAX_CORRELATION,
            conversational_min_alternation: CONVERSATIONAL_MIN_ALTERNATION,
            dominance_db: DOMINANCE_DB,
            bleed_correlation_threshold: BLEED_CORRELATION_THRESHOLD,
            bleed_max_isolation_db: BLEED_MAX_ISOLATION_DB,
            bleed_min_windows: BLEED_MIN_WINDOWS,
            overlap_level_tolerance_db: OVERLAP_LEVEL_TOLERANCE_DB,
            drift_envelope_ms: DRIFT_ENVELOPE_MS,
            drift_max_lag_ms: DRIFT_MAX_LAG_MS,
            drift_segments: DRIFT_SEGMENTS,
            drift_segment_seconds: DRIFT_SEGMENT_SECONDS,
            drift_min_correlation: DRIFT_MIN_CORRELATION,
        }
    }
}

/// 完整分析配置（全部阈值）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 公共分析窗口（毫秒）
    pub analysis_window_ms: f64,
    /// 混响短窗口（毫秒）
    pub reverb_window_ms: f64,
    pub noise_floor: NoiseFloorConfig,
    pub segmentation: SegmentationConfig,
    pub clipping: ClippingConfig,
    pub reverb: ReverbConfig,
    pub stereo: StereoConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analysis_window_ms: constants::window::ANALYSIS_WINDOW_MS,
            reverb_window_ms: constants::window::REVERB_WINDOW_MS,
            noise_floor: NoiseFloorConfig::default(),
            segmentation: SegmentationConfig::default(),
            clipping: ClippingConfig::default(),
            reverb: ReverbConfig::default(),
            stereo: StereoConfig::default(),
        }
    }
}

fn require(condition: bool, message: &str) -> AnalysisResult<()> {
    if condition {
        Ok(())
    } else {
        Err(invalid_input("配置无效", message))
    }
}

impl AnalysisConfig {
    /// 校验配置取值范围
    pub fn validate(&self) -> AnalysisResult<()> {
        require(
            self.analysis_window_ms > 0.0,
            "analysis_window_ms 必须大于0",
        )?;
        require(self.reverb_window_ms > 0.0, "reverb_window_ms 必须大于0")?;
        require(
            (0.0..=100.0).contains(&self.noise_floor.percentile),
            "noise_floor.percentile 必须在0-100之间",
        )?;

        let seg = &self.segmentation;
        require(
            seg.hysteresis_db >= 0.0,
            "segmentation.hysteresis_db 不能为负",
        )?;
        require(
            seg.silence_floor_clamp_db.is_finite(),
            "segmentation.silence_floor_clamp_db 必须为有限值",
        )?;
        require(
            seg.min_silence_ms >= 0.0 && seg.min_speech_ms >= 0.0,
            "segmentation 最短区间不能为负",
        )?;

        let clip = &self.clipping;
        require(
            clip.threshold > 0.0 && clip.threshold <= 1.0,
            "clipping.threshold 必须在(0, 1]之间",
        )?;
        require(
            clip.plosive_max_ms > 0.0,
            "clipping.plosive_max_ms 必须大于0",
        )?;

        let rv = &self.reverb;
        require(
            rv.decay_fit_range_db > 0.0,
            "reverb.decay_fit_range_db 必须大于0",
        )?;
        require(rv.min_fit_points >= 2, "reverb.min_fit_points 至少为2")?;
        require(
            rv.refine_hop_divisor >= 1,
            "reverb.refine_hop_divisor 至少为1",
        )?;
        require(rv.target_decays >= 1, "reverb.target_decays 至少为1")?;
        require(
            rv.max_decay_seconds > 0.0,
            "reverb.max_decay_seconds 必须大于0",
        )?;

        let st = &self.stereo;
        require(
            (-1.0..=1.0).contains(&st.dual_mono_correlation)
                && (-1.0..=1.0).contains(&st.conversational_max_correlation),
            "stereo 相关系数阈值必须在[-1, 1]之间",
        )?;
        require(
            (0.0..=1.0).contains(&st.conversational_min_alternation),
            "stereo.conversational_min_alternation 必须在[0, 1]之间",
        )?;
        require(
            st.drift_envelope_ms > 0.0 && st.drift_max_lag_ms >= 0.0,
            "stereo 漂移估计参数无效",
        )?;
        require(st.drift_segments >= 1, "stereo.drift_segments 至少为1")?;

        Ok(())
    }
}

/// 单次分析选项
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub peak_mode: PeakMode,
    /// 启用实验性分析（混响估计）
    pub enable_experimental: bool,
    pub config: AnalysisConfig,
}

impl AnalysisOptions {
    pub fn with_peak_mode(mut self, peak_mode: PeakMode) -> Self {
        self.peak_mode = peak_mode;
        self
    }

    pub fn with_experimental(mut self, enabled: bool) -> Self {
        self.enable_experimental = enabled;
        self
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }
}
