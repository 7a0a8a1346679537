//! 输入与数值防护
//!
//! 分析入口处的缓冲区检查，以及计算结果的数值防护：
//! 1. 输入验证 - 声道数、采样率、非有限样本统计
//! 2. 边界检查 - 声道/窗口索引
//! 3. 计算异常 - 结果中出现 NaN 时报告计算错误

use crate::core::SampleBuffer;
use crate::error::{AnalysisError, AnalysisResult, calculation_error};
use crate::processing::CancellationToken;

/// 支持的最大声道数
pub const MAX_CHANNELS: usize = 32;

/// 缓冲区检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferInspection {
    pub channel_count: usize,
    pub frames: u64,
    /// NaN/inf 样本数（分析时按0计入）
    pub non_finite_samples: u64,
}

pub struct SafetyGuard;

impl SafetyGuard {
    /// 输入验证：检查声道数并统计非有限样本
    ///
    /// 零声道返回 `NoChannels`；零帧合法（由调用方降级为哨兵值）。
    /// 每扫描 `block_frames` 帧轮询一次取消令牌。
    pub fn inspect_buffer(
        buffer: &SampleBuffer,
        block_frames: usize,
        cancel: &CancellationToken,
    ) -> AnalysisResult<BufferInspection> {
        let channel_count = buffer.channel_count();
        if channel_count == 0 {
            return Err(AnalysisError::NoChannels);
        }
        if channel_count > MAX_CHANNELS {
            return Err(AnalysisError::InvalidInput(format!(
                "声道数({channel_count})不能超过{MAX_CHANNELS}"
            )));
        }

        let block = block_frames.max(1);
        let mut non_finite_samples = 0u64;
        for channel in buffer.channels() {
            for chunk in channel.chunks(block) {
                cancel.check()?;
                non_finite_samples += chunk.iter().filter(|s| !s.is_finite()).count() as u64;
            }
        }

        Ok(BufferInspection {
            channel_count,
            frames: buffer.length(),
            non_finite_samples,
        })
    }

    /// 边界检查
    pub fn check_bounds(index: usize, length: usize, context: &str) -> AnalysisResult<()> {
        if index >= length {
            return Err(AnalysisError::InvalidInput(format!(
                "{context}中索引({index})超出范围(0-{})",
                length.saturating_sub(1)
            )));
        }

        Ok(())
    }

    /// 计算异常防护：NaN 一律视为计算错误（-inf/+inf 是合法的dB哨兵）
    pub fn validate_calculation(value: f64, operation: &str) -> AnalysisResult<f64> {
        if value.is_nan() {
            return Err(calculation_error(operation, "结果为NaN"));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_channels_is_no_channels() {
        let buffer = SampleBuffer::new(48000, Vec::new()).unwrap();
        let result = SafetyGuard::inspect_buffer(&buffer, 2400, &CancellationToken::new());
        assert_eq!(result, Err(AnalysisError::NoChannels));
    }

    #[test]
    fn test_counts_non_finite_samples() {
        let buffer = SampleBuffer::new(
            8000,
            vec![vec![0.0, f32::NAN, 0.5], vec![f32::INFINITY, 0.1, f32::NEG_INFINITY]],
        )
        .unwrap();
        let inspection =
            SafetyGuard::inspect_buffer(&buffer, 2, &CancellationToken::new()).unwrap();
        assert_eq!(inspection.non_finite_samples, 3);
        assert_eq!(inspection.channel_count, 2);
        assert_eq!(inspection.frames, 3);
    }

    #[test]
    fn test_empty_buffer_is_accepted() {
        let buffer = SampleBuffer::new(8000, vec![Vec::new()]).unwrap();
        let inspection =
            SafetyGuard::inspect_buffer(&buffer, 400, &CancellationToken::new()).unwrap();
        assert_eq!(inspection.frames, 0);
    }

    #[test]
    fn test_bounds_and_nan_guard() {
        assert!(SafetyGuard::check_bounds(1, 2, "声道").is_ok());
        assert!(SafetyGuard::check_bounds(2, 2, "声道").is_err());
        assert_eq!(
            SafetyGuard::validate_calculation(f64::NEG_INFINITY, "噪声底").unwrap(),
            f64::NEG_INFINITY
        );
        assert!(matches!(
            SafetyGuard::validate_calculation(f64::NAN, "混响"),
            Err(AnalysisError::CalculationError(_))
        ));
    }
}
