//! MacinMeter Voice QC - 语音录音质量指标引擎
//!
//! 从已解码的声道分离样本计算客观的录音质量指标。
//!
//! ## 核心特性
//! - 峰值电平（精确逐样本 / 快速抽样两种模式）
//! - 噪声底：窗口RMS分布的低分位估计，数字静音为 `-inf`
//! - 静音/语音分段：带迟滞的两态状态机，首尾静音单独报告
//! - 削波检测：样本级扫描，爆破音(<20 ms)与持续削波分类
//! - 混响时间（RT60，实验性）：起始点检测 + T30风格衰减回归
//! - 声道关系：双单声道/真立体声/对话立体声分类、串音、对话重叠与同步漂移
//!
//! 引擎不做解码、不访问存储或网络；输入为 `SampleBuffer`，输出为 `AudioMetrics`。

pub mod analyzers;
pub mod core;
pub mod error;
pub mod processing;
pub mod utils;

// 重新导出核心类型
pub use analyzers::{ClipSeverity, ReverbInterpretation, StereoType};
pub use crate::core::{AnalysisConfig, AnalysisOptions, PeakMode, Region, SampleBuffer};
pub use error::{AnalysisError, AnalysisResult, ErrorCategory};
pub use processing::{
    AnalysisWarning, AudioAnalyzer, AudioMetrics, BatchAnalyzer, BatchEvent, CancellationToken,
};
