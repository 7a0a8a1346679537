//! 质量指标分析器
//!
//! 每个分析器只依赖窗口统计核心和更早阶段的输出：
//! 窗口 → {峰值, 噪声底} → {静音分段, 削波} → {混响, 声道关系}。

pub mod clipping;
pub mod noise_floor;
pub mod peak;
pub mod reverb;
pub mod segmenter;
pub mod stereo;

// 重新导出公共接口
pub use clipping::{
    ChannelClipping, ClipKind, ClipSeverity, ClippedRegion, ClippingAnalyzer, ClippingResult,
};
pub use noise_floor::{NoiseFloorAnalyzer, NoiseFloorEstimate};
pub use peak::{PeakAnalyzer, PeakResult};
pub use reverb::{ReverbEstimate, ReverbEstimator, ReverbInterpretation};
pub use segmenter::{SegmentationResult, SegmentationThresholds, SilenceSegmenter};
pub use stereo::{
    ConversationalAnalysis, MicBleedAnalysis, StereoAnalyzer, StereoRelationship, StereoType,
    SyncDriftEstimate,
};
