//! 已解码音频缓冲区
//!
//! 分析引擎的唯一输入：采样率 + 帧数 + 声道分离的f32样本数组。
//! 缓冲区由调用方持有，引擎只借用，永不修改。

use crate::error::{AnalysisError, AnalysisResult, invalid_input};

/// 声道分离的只读样本缓冲区
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    length: u64,
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// 从声道数组创建缓冲区
    ///
    /// 所有声道长度必须一致；允许零声道（由聚合层报告 `NoChannels`）。
    ///
    /// # 示例
    ///
    /// ```rust
    /// use macinmeter_voice_qc::SampleBuffer;
    ///
    /// let buffer = SampleBuffer::new(48000, vec![vec![0.0; 480], vec![0.0; 480]]).unwrap();
    /// assert_eq!(buffer.length(), 480);
    /// assert_eq!(buffer.channel_count(), 2);
    /// assert!((buffer.duration_seconds() - 0.01).abs() < 1e-12);
    /// ```
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> AnalysisResult<Self> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidInput("采样率必须大于0".to_string()));
        }

        let length = channels.first().map(|c| c.len()).unwrap_or(0);
        if let Some((idx, ch)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != length)
        {
            return Err(invalid_input(
                "声道长度不一致",
                format!("声道{idx}为{}帧，声道0为{length}帧", ch.len()),
            ));
        }

        Ok(Self {
            sample_rate,
            length: length as u64,
            channels,
        })
    }

    /// 从交错样本创建缓冲区（一次遍历分发到各声道）
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> AnalysisResult<Self> {
        if channel_count == 0 {
            return Err(AnalysisError::InvalidInput("声道数必须大于0".to_string()));
        }
        if !samples.len().is_multiple_of(channel_count) {
            return Err(AnalysisError::InvalidInput(format!(
                "样本数量({})必须是声道数({})的倍数",
                samples.len(),
                channel_count
            )));
        }

        let frames = samples.len() / channel_count;
        let mut channels: Vec<Vec<f32>> = (0..channel_count)
            .map(|_| Vec::with_capacity(frames))
            .collect();

        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        Self::new(sample_rate, channels)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 帧数
    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    /// 零声道或零帧
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() || self.length == 0
    }

    #[inline]
    pub fn duration_seconds(&self) -> f64 {
        self.length as f64 / self.sample_rate as f64
    }

    /// 帧索引转换为秒
    #[inline]
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    /// 毫秒转换为帧数（四舍五入，至少为1）
    #[inline]
    pub fn ms_to_frames(&self, ms: f64) -> usize {
        ((ms * self.sample_rate as f64 / 1000.0).round() as usize).max(1)
    }
}
