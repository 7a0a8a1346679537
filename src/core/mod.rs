//! 核心数据结构模块
//!
//! 包含样本缓冲区、窗口统计、dB分布、时间区间与分析配置。

pub mod channel_data;
pub mod config;
pub mod constants;
pub mod histogram;
pub mod region;
pub mod sample_buffer;
pub mod statistics;
pub mod window;

// 重新导出公共接口
pub use channel_data::ChannelData;
pub use config::{
    AnalysisConfig, AnalysisOptions, ClippingConfig, NoiseFloorConfig, PeakMode, ReverbConfig,
    SegmentationConfig, StereoConfig,
};
pub use histogram::DbDistribution;
pub use region::{Region, TimelineEvent, merge_regions, regions_to_timeline, timeline_to_regions};
pub use sample_buffer::SampleBuffer;
pub use statistics::{LinearFit, PearsonAccumulator, median, pearson};
pub use window::{
    ChannelMode, Window, WindowCache, WindowProcessor, amplitude_to_db,
};
