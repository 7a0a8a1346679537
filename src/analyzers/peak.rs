//! 峰值分析器
//!
//! - **Accurate**：逐样本扫描，合规测量必须使用
//! - **Fast**：固定步长抽样（每5个样本取1个），结果是近似值
//!
//! 零声道或零帧输入返回 `peak = 0`（`-inf` dB），不报错。

use crate::core::window::amplitude_to_db;
use crate::core::{PeakMode, SampleBuffer};
use crate::error::AnalysisResult;
use crate::processing::CancellationToken;
use crate::utils::db_serde;
use serde::{Deserialize, Serialize};

/// 峰值检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakResult {
    /// 所有声道的最大绝对值（线性）
    pub peak: f64,
    #[serde(with = "db_serde")]
    pub peak_db: f64,
    pub per_channel_peak: Vec<f64>,
    #[serde(with = "db_serde::vec")]
    pub per_channel_peak_db: Vec<f64>,
    pub mode: PeakMode,
}

impl PeakResult {
    fn from_channel_peaks(per_channel_peak: Vec<f64>, mode: PeakMode) -> Self {
        let peak = per_channel_peak.iter().copied().fold(0.0, f64::max);
        Self {
            peak,
            peak_db: amplitude_to_db(peak),
            per_channel_peak_db: per_channel_peak
                .iter()
                .map(|&p| amplitude_to_db(p))
                .collect(),
            per_channel_peak,
            mode,
        }
    }

    /// 是否为近似值
    #[inline]
    pub fn is_approximate(&self) -> bool {
        self.mode == PeakMode::Fast
    }
}

pub struct PeakAnalyzer {
    mode: PeakMode,
    block_frames: usize,
}

impl PeakAnalyzer {
    /// `block_frames` 为取消轮询的块大小（通常等于一个分析窗口）
    pub fn new(mode: PeakMode, block_frames: usize) -> Self {
        Self {
            mode,
            block_frames: block_frames.max(1),
        }
    }

    pub fn analyze(
        &self,
        buffer: &SampleBuffer,
        cancel: &CancellationToken,
    ) -> AnalysisResult<PeakResult> {
        let stride = self.mode.stride();
        let mut per_channel_peak = Vec::with_capacity(buffer.channel_count());

        for channel in buffer.channels() {
            per_channel_peak.push(self.scan_channel(channel, stride, cancel)?);
        }

        Ok(PeakResult::from_channel_peaks(per_channel_peak, self.mode))
    }

    fn scan_channel(
        &self,
        samples: &[f32],
        stride: usize,
        cancel: &CancellationToken,
    ) -> AnalysisResult<f64> {
        let mut peak = 0.0f32;
        let mut block_start = 0usize;

        while block_start < samples.len() {
            cancel.check()?;
            let block_end = (block_start + self.block_frames).min(samples.len());
            // 抽样点在全局索引上对齐到步长的整数倍
            let first = block_start.div_ceil(stride) * stride;
            if first < block_end {
                for &sample in samples[first..block_end].iter().step_by(stride) {
                    let abs = sample.abs();
                    if abs.is_finite() && abs > peak {
                        peak = abs;
                    }
                }
            }
            block_start = block_end;
        }

        Ok(peak as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    #[test]
    fn test_accurate_finds_single_sample_peak() {
        let mut samples = vec![0.1f32; 1000];
        samples[503] = -0.9;
        let buffer = SampleBuffer::new(1000, vec![samples]).unwrap();

        let accurate = PeakAnalyzer::new(PeakMode::Accurate, 100)
            .analyze(&buffer, &CancellationToken::new())
            .unwrap();
        assert!((accurate.peak - 0.9).abs() < 1e-6);
        assert!(!accurate.is_approximate());

        // 503不是5的倍数，快速模式会错过这个孤立峰值
        let fast = PeakAnalyzer::new(PeakMode::Fast, 100)
            .analyze(&buffer, &CancellationToken::new())
            .unwrap();
        assert!((fast.peak - 0.1).abs() < 1e-6);
        assert!(fast.is_approximate());
    }

    #[test]
    fn test_fast_mode_stride_alignment_across_blocks() {
        let mut samples = vec![0.0f32; 1000];
        samples[105] = 0.5;
        let buffer = SampleBuffer::new(1000, vec![samples]).unwrap();
        // 块大小不是步长的倍数时，105仍是抽样点
        let fast = PeakAnalyzer::new(PeakMode::Fast, 33)
            .analyze(&buffer, &CancellationToken::new())
            .unwrap();
        assert_eq!(fast.peak, 0.5);
    }

    #[test]
    fn test_degenerate_input_is_negative_infinity() {
        let buffer = SampleBuffer::new(48000, Vec::new()).unwrap();
        let result = PeakAnalyzer::new(PeakMode::Accurate, 2400)
            .analyze(&buffer, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.peak, 0.0);
        assert_eq!(result.peak_db, f64::NEG_INFINITY);
        assert!(result.per_channel_peak_db.is_empty());
    }

    #[test]
    fn test_per_channel_peaks_and_non_finite_ignored() {
        let buffer = SampleBuffer::new(
            100,
            vec![vec![0.25, f32::NAN, -0.5], vec![f32::INFINITY, 0.125, 0.0]],
        )
        .unwrap();
        let result = PeakAnalyzer::new(PeakMode::Accurate, 2)
            .analyze(&buffer, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.per_channel_peak, vec![0.5, 0.125]);
        assert_eq!(result.peak, 0.5);
        assert!((result.peak_db + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn test_cancelled_scan() {
        let buffer = SampleBuffer::new(100, vec![vec![0.1; 1000]]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = PeakAnalyzer::new(PeakMode::Accurate, 100).analyze(&buffer, &cancel);
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }
}
