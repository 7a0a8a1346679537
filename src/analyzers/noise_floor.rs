//! 噪声底估计
//!
//! 取窗口RMS dB分布的低分位（最近秩，默认第10百分位）作为环境噪声底。
//! 不使用最小值：单个异常安静的窗口不会拉低估计。
//! 数字静音窗口（精确为0）不参与分位：首尾补零不会把有底噪的录音估成 `-inf`。
//! 只有全部窗口为数字静音（或没有窗口）时才得到 `-inf`。

use crate::core::{DbDistribution, NoiseFloorConfig, Window};
use crate::utils::db_serde;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[cfg(debug_assertions)]
macro_rules! debug_noise_floor {
    ($($arg:tt)*) => {
        log::debug!(target: "noise_floor", $($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! debug_noise_floor {
    ($($arg:tt)*) => {};
}

/// 噪声底估计结果，`-inf` 表示数字静音
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseFloorEstimate {
    #[serde(with = "db_serde")]
    pub overall_db: f64,
    #[serde(with = "db_serde::vec")]
    pub per_channel_db: Vec<f64>,
}

impl NoiseFloorEstimate {
    #[inline]
    pub fn is_digital_silence(&self) -> bool {
        self.overall_db == f64::NEG_INFINITY
    }
}

pub struct NoiseFloorAnalyzer {
    config: NoiseFloorConfig,
}

impl NoiseFloorAnalyzer {
    pub fn new(config: NoiseFloorConfig) -> Self {
        Self { config }
    }

    /// 单组窗口的噪声底
    pub fn floor_of(&self, windows: &[Window]) -> f64 {
        let mut distribution = DbDistribution::with_capacity(windows.len());
        distribution.extend(windows.iter().map(|w| w.rms_db));
        let floor = distribution.percentile(self.config.percentile);
        debug_noise_floor!(
            "噪声底: finite={}, digital_silence={}, floor={:.2} dB",
            distribution.finite_count(),
            distribution.silent_count(),
            floor
        );
        floor
    }

    /// 合并窗口得到总体噪声底，单声道窗口得到各声道噪声底
    pub fn analyze(
        &self,
        combined: &[Window],
        per_channel: &[Rc<[Window]>],
    ) -> NoiseFloorEstimate {
        NoiseFloorEstimate {
            overall_db: self.floor_of(combined),
            per_channel_db: per_channel
                .iter()
                .map(|w| self.floor_of(w))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChannelMode, SampleBuffer, WindowProcessor};
    use crate::processing::CancellationToken;

    fn windows_for(samples: Vec<f32>, rate: u32, frames: usize) -> Vec<Window> {
        let buffer = SampleBuffer::new(rate, vec![samples]).unwrap();
        WindowProcessor::new(frames)
            .compute(&buffer, ChannelMode::Combined, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_floor_ignores_single_quiet_outlier() {
        // 20个窗口：19个 -40 dB 左右，1个 -80 dB
        let mut samples = Vec::new();
        for i in 0..20 {
            let level = if i == 7 { 0.0001f32 } else { 0.01 };
            samples.extend(std::iter::repeat_n(level, 100));
        }
        let windows = windows_for(samples, 1000, 100);
        let analyzer = NoiseFloorAnalyzer::new(NoiseFloorConfig::default());
        let floor = analyzer.floor_of(&windows);
        assert!((floor + 40.0).abs() < 1e-3, "floor = {floor}");
    }

    #[test]
    fn test_digital_silence_floor() {
        let windows = windows_for(vec![0.0; 1000], 1000, 50);
        let analyzer = NoiseFloorAnalyzer::new(NoiseFloorConfig::default());
        assert_eq!(analyzer.floor_of(&windows), f64::NEG_INFINITY);
        assert_eq!(analyzer.floor_of(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_zero_padded_head_keeps_room_tone_floor() {
        // 前40%窗口为补零，其余为 -40 dB 底噪与 -20 dB 信号
        let mut samples = vec![0.0f32; 800];
        for i in 0..12 {
            let level = if i % 2 == 0 { 0.01f32 } else { 0.1 };
            samples.extend(std::iter::repeat_n(level, 100));
        }
        let windows = windows_for(samples, 1000, 100);
        let floor = NoiseFloorAnalyzer::new(NoiseFloorConfig::default()).floor_of(&windows);
        assert!((floor + 40.0).abs() < 1e-3, "floor = {floor}");
    }

    #[test]
    fn test_per_channel_floors() {
        let buffer = SampleBuffer::new(1000, vec![vec![0.1; 500], vec![0.0; 500]]).unwrap();
        let cancel = CancellationToken::new();
        let processor = WindowProcessor::new(50);
        let combined = processor
            .compute(&buffer, ChannelMode::Combined, &cancel)
            .unwrap();
        let per_channel: Vec<Rc<[Window]>> = (0..2)
            .map(|ch| {
                Rc::from(
                    processor
                        .compute(&buffer, ChannelMode::Single(ch), &cancel)
                        .unwrap(),
                )
            })
            .collect();

        let estimate =
            NoiseFloorAnalyzer::new(NoiseFloorConfig::default()).analyze(&combined, &per_channel);
        assert!((estimate.per_channel_db[0] + 20.0).abs() < 1e-3);
        assert_eq!(estimate.per_channel_db[1], f64::NEG_INFINITY);
        // 合并RMS = sqrt(0.01/2) → -23.01 dB
        assert!((estimate.overall_db + 23.0103).abs() < 1e-3);
        assert!(!estimate.is_digital_silence());
    }
}
