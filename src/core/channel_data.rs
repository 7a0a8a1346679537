//! 窗口累积器
//!
//! 每个窗口（单声道或多声道合并）的平方和、峰值与样本计数累积。
//! 所有窗口级分析器都通过它得到一致的 RMS 定义：
//! RMS = sqrt(Σx² / n)，n 包含所有参与聚合的声道样本。

use std::fmt;

/// 窗口级累积数据
///
/// 使用`#[repr(C)]`确保内存布局稳定：
/// - 0-7字节：平方和 (f64)
/// - 8-15字节：峰值 (f64)
/// - 16-23字节：样本计数 (u64)
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ChannelData {
    /// 累积平方和
    pub rms_accumulator: f64,

    /// 绝对值峰值
    pub peak: f64,

    /// 已累积的样本数（所有聚合声道合计）
    pub sample_count: u64,
}

impl ChannelData {
    /// 创建新的空累积器
    ///
    /// # 示例
    ///
    /// ```rust
    /// use macinmeter_voice_qc::core::ChannelData;
    ///
    /// let data = ChannelData::new();
    /// assert_eq!(data.rms_accumulator, 0.0);
    /// assert_eq!(data.peak, 0.0);
    /// assert_eq!(data.sample_count, 0);
    /// ```
    pub fn new() -> Self {
        Self {
            rms_accumulator: 0.0,
            peak: 0.0,
            sample_count: 0,
        }
    }

    /// 处理单个样本
    ///
    /// 非有限样本（NaN/inf）按 0 计入，保证下游不被 NaN 污染。
    ///
    /// # 示例
    ///
    /// ```rust
    /// use macinmeter_voice_qc::core::ChannelData;
    ///
    /// let mut data = ChannelData::new();
    /// data.process_sample(0.5);
    /// data.process_sample(-0.8);
    ///
    /// assert!(data.rms_accumulator > 0.0);
    /// assert!((data.peak - 0.8).abs() < 1e-6);
    /// ```
    #[inline]
    pub fn process_sample(&mut self, sample: f32) {
        let sample_f64 = if sample.is_finite() {
            sample as f64
        } else {
            0.0
        };
        let abs_sample = sample_f64.abs();

        self.rms_accumulator += sample_f64 * sample_f64;
        if abs_sample > self.peak {
            self.peak = abs_sample;
        }
        self.sample_count += 1;
    }

    /// 批量处理一段连续样本
    #[inline]
    pub fn process_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.process_sample(sample);
        }
    }

    /// 计算RMS值，样本数为0时返回0.0
    ///
    /// # 示例
    ///
    /// ```rust
    /// use macinmeter_voice_qc::core::ChannelData;
    ///
    /// let mut data = ChannelData::new();
    /// data.process_sample(1.0);
    /// data.process_sample(0.0);
    ///
    /// assert!((data.calculate_rms() - 0.7071067811865476).abs() < 1e-10); // sqrt(0.5)
    /// ```
    pub fn calculate_rms(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        (self.rms_accumulator / self.sample_count as f64).sqrt()
    }

    /// 重置所有累积数据
    pub fn reset(&mut self) {
        self.rms_accumulator = 0.0;
        self.peak = 0.0;
        self.sample_count = 0;
    }
}

impl Default for ChannelData {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChannelData {{ rms_acc: {:.6}, peak: {:.6}, n: {} }}",
            self.rms_accumulator, self.peak, self.sample_count
        )
    }
}

// 编译时静态断言：确保ChannelData结构体大小为24字节
const _: [u8; 24] = [0; std::mem::size_of::<ChannelData>()];
