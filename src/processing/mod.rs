//! 分析流程编排模块
//!
//! 结果聚合、协作式取消、进度上报与多文件并行分析。

pub mod analysis_coordinator;
pub mod batch;
pub mod cancellation;
pub mod progress;

// 重新导出公共接口
pub use analysis_coordinator::{AnalysisWarning, AudioAnalyzer, AudioMetrics};
pub use batch::{BatchAnalyzer, BatchEvent, BatchOutcome, BatchReport, BatchStats};
pub use cancellation::CancellationToken;
pub use progress::{ProgressCallback, ProgressReporter, stage};
