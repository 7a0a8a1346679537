//! 常量和默认配置集中管理
//!
//! 将所有阈值默认值集中定义，避免"默认值漂移"和重复定义。
//! `AnalysisConfig::default()` 完全由这里的常量构成。

/// 窗口统计常量
pub mod window {
    /// 噪声底/静音分段/声道关系共用的窗口时长（毫秒）
    pub const ANALYSIS_WINDOW_MS: f64 = 50.0;

    /// 混响起始点检测的短窗口时长（毫秒，约1024样本@48kHz）
    pub const REVERB_WINDOW_MS: f64 = 21.0;
}

/// 峰值检测常量
pub mod peak {
    /// 快速模式的固定抽样步长
    ///
    /// 实测约93%的快速模式误差低于0.5 dB，扫描成本减半以上
    pub const FAST_MODE_STRIDE: usize = 5;
}

/// 噪声底估计常量
pub mod noise_floor {
    /// 取窗口dB分布的低分位（最近秩），不取最小值以抵抗单个异常安静窗口
    pub const PERCENTILE: f64 = 10.0;
}

/// 静音/语音分段常量
pub mod segmentation {
    /// 语音判定阈值相对噪声底的余量（dB）
    pub const SPEECH_MARGIN_DB: f64 = 8.0;

    /// 迟滞量（dB）：离开语音态的阈值 = 进入阈值 - 迟滞
    pub const HYSTERESIS_DB: f64 = 3.0;

    /// 判定阈值的噪声底下限（dBFS），噪声底为 -inf 时仍保持有限阈值
    pub const SILENCE_FLOOR_CLAMP_DB: f64 = -96.0;

    /// 最短静音区间（毫秒），更短的静音视为测量噪声
    pub const MIN_SILENCE_MS: f64 = 250.0;

    /// 最短语音区间（毫秒）
    pub const MIN_SPEECH_MS: f64 = 100.0;
}

/// 削波检测常量
pub mod clipping {
    /// 削波阈值（满量程比例）
    pub const THRESHOLD: f32 = 0.985;

    /// 爆破音/持续削波分界（毫秒），与采样率无关
    pub const PLOSIVE_MAX_MS: f64 = 20.0;

    /// 爆破音削波区间数超过此值升级为警告
    pub const PLOSIVE_WARNING_COUNT: usize = 20;

    /// 报告中保留的最大区间数（计数保持精确）
    pub const MAX_REPORTED_REGIONS: usize = 10_000;
}

/// 混响估计常量
pub mod reverb {
    /// 相邻窗口上升超过此值视为起始点（dB）
    pub const ONSET_RISE_DB: f64 = 12.0;

    /// 起始点电平至少高于有效噪声底的量（dB）
    pub const ONSET_MIN_ABOVE_FLOOR_DB: f64 = 25.0;

    /// 距峰值多少dB开始拟合（T30风格：-5 dB起）
    pub const DECAY_FIT_START_DB: f64 = 5.0;

    /// 拟合的衰减跨度（dB）
    pub const DECAY_FIT_RANGE_DB: f64 = 30.0;

    /// 衰减跟踪在噪声底之上多少dB停止
    pub const DECAY_STOP_MARGIN_DB: f64 = 10.0;

    /// 衰减过程中的回升容差（dB），超过即视为新的声音事件
    pub const DECAY_RERISE_DB: f64 = 3.0;

    /// 单次衰减最长跟踪时长（秒）
    pub const MAX_DECAY_SECONDS: f64 = 3.0;

    /// 拟合所需的最少点数
    pub const MIN_FIT_POINTS: usize = 5;

    /// 点数不足时细化拟合的步长分母（步长 = 窗口 / 8，约2.6 ms@48kHz）
    ///
    /// 21 ms 窗口下 RT60 < 0.2 s 的衰减在30 dB跨度内不足5个点
    pub const REFINE_HOP_DIVISOR: usize = 8;

    /// 接受拟合的最小决定系数
    pub const MIN_FIT_R2: f64 = 0.7;

    /// 达到满置信度所需的有效衰减数
    pub const TARGET_DECAYS: usize = 10;

    /// 低置信度分界
    pub const LOW_CONFIDENCE: f64 = 0.3;
}

/// 声道关系常量
pub mod stereo {
    /// 相关系数不低于此值判定为双单声道
    pub const DUAL_MONO_CORRELATION: f64 = 0.999;

    /// 整体RMS低于此值（dBFS）的声道视为无信号
    pub const SILENT_CHANNEL_DB: f64 = -90.0;

    /// 对话立体声的相关系数上限
    pub const CONVERSATIONAL_MAX_CORRELATION: f64 = 0.5;

    /// 对话立体声要求的能量交替比例下限
    pub const CONVERSATIONAL_MIN_ALTERNATION: f64 = 0.5;

    /// 声道主导判定的电平差（dB）
    pub const DOMINANCE_DB: f64 = 6.0;

    /// 串音判定的包络相关阈值
    pub const BLEED_CORRELATION_THRESHOLD: f64 = 0.5;

    /// 串音判定的最大隔离度（dB），隔离度更高视为可忽略
    pub const BLEED_MAX_ISOLATION_DB: f64 = 40.0;

    /// 串音分析所需的最少窗口数
    pub const BLEED_MIN_WINDOWS: usize = 10;

    /// 重叠判定：两声道电平差在此范围内才算同时说话（dB）
    pub const OVERLAP_LEVEL_TOLERANCE_DB: f64 = 12.0;

    /// 同步漂移估计的包络分辨率（毫秒）
    pub const DRIFT_ENVELOPE_MS: f64 = 5.0;

    /// 同步漂移估计的最大搜索延迟（毫秒）
    pub const DRIFT_MAX_LAG_MS: f64 = 100.0;

    /// 同步漂移估计的采样片段数
    pub const DRIFT_SEGMENTS: usize = 6;

    /// 每个采样片段的时长（秒）
    pub const DRIFT_SEGMENT_SECONDS: f64 = 20.0;

    /// 片段互相关峰值低于此值不参与漂移估计
    pub const DRIFT_MIN_CORRELATION: f64 = 0.3;
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// 限制最大并发度为16，避免过度并发导致的：
    /// - 上下文切换开销
    /// - 内存占用过高
    /// - 系统资源竞争
    pub const MAX_PARALLEL_DEGREE: usize = 16;

    /// 默认多文件并发度
    pub const DEFAULT_PARALLEL_DEGREE: usize = 4;
}
