//! 窗口统计核心
//!
//! 将缓冲区按固定时长切分为窗口，计算每个窗口的RMS/Peak：
//! 1. 窗口按帧对齐，从第0帧开始连续覆盖整个缓冲区（或指定帧区间）
//! 2. 最后一个窗口可以更短，不做填充
//! 3. 指定步长（hop）小于窗口时生成重叠窗口，只用于局部细化
//! 4. `Combined` 模式跨声道累积平方和，样本数包含所有声道
//! 5. dB = 20·log10(x)，精确的0映射为 -inf 且不做截断
//!
//! 同一次分析中，相同窗口尺寸的窗口只计算一次（`WindowCache`），
//! 所有共享该尺寸的分析器看到完全相同的窗口边界。

use super::channel_data::ChannelData;
use super::sample_buffer::SampleBuffer;
use crate::error::AnalysisResult;
use crate::processing::CancellationToken;
use crate::utils::SafetyGuard;
use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;

#[cfg(debug_assertions)]
macro_rules! debug_window {
    ($($arg:tt)*) => {
        log::debug!(target: "window", $($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! debug_window {
    ($($arg:tt)*) => {};
}

/// 线性幅度转dB，0（或负值）映射为 -inf
#[inline]
pub fn amplitude_to_db(value: f64) -> f64 {
    if value > 0.0 {
        20.0 * value.log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// 固定时长窗口的统计结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    /// 起始帧（含）
    pub start_sample: u64,
    /// 结束帧（不含）
    pub end_sample: u64,
    pub rms: f64,
    pub peak: f64,
    pub rms_db: f64,
    pub peak_db: f64,
}

impl Window {
    fn from_data(start_sample: u64, end_sample: u64, data: &ChannelData) -> Self {
        let rms = data.calculate_rms();
        Self {
            start_sample,
            end_sample,
            rms,
            peak: data.peak,
            rms_db: amplitude_to_db(rms),
            peak_db: amplitude_to_db(data.peak),
        }
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.end_sample - self.start_sample
    }

    #[inline]
    pub fn start_time(&self, sample_rate: u32) -> f64 {
        self.start_sample as f64 / sample_rate as f64
    }

    #[inline]
    pub fn end_time(&self, sample_rate: u32) -> f64 {
        self.end_sample as f64 / sample_rate as f64
    }

    /// 窗口中心时间（秒）
    #[inline]
    pub fn center_time(&self, sample_rate: u32) -> f64 {
        (self.start_sample + self.end_sample) as f64 * 0.5 / sample_rate as f64
    }

    /// 数字静音（所有样本精确为0）
    #[inline]
    pub fn is_digital_silence(&self) -> bool {
        self.rms == 0.0
    }
}

/// 声道聚合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    /// 所有声道平方和合并
    Combined,
    /// 仅统计指定声道
    Single(usize),
}

/// 窗口处理器
///
/// 对缓冲区做窗口切分与统计。每处理完一个窗口轮询一次取消令牌。
#[derive(Debug, Clone, Copy)]
pub struct WindowProcessor {
    window_frames: usize,
    hop_frames: usize,
}

impl WindowProcessor {
    /// 创建指定帧数的窗口处理器（至少为1帧），窗口首尾相接
    pub fn new(window_frames: usize) -> Self {
        let window_frames = window_frames.max(1);
        Self {
            window_frames,
            hop_frames: window_frames,
        }
    }

    /// 重叠窗口处理器，步长限制在 [1, window_frames]
    pub fn with_hop(window_frames: usize, hop_frames: usize) -> Self {
        let window_frames = window_frames.max(1);
        Self {
            window_frames,
            hop_frames: hop_frames.clamp(1, window_frames),
        }
    }

    #[inline]
    pub fn window_frames(&self) -> usize {
        self.window_frames
    }

    #[inline]
    pub fn hop_frames(&self) -> usize {
        self.hop_frames
    }

    /// 对整个缓冲区计算窗口
    pub fn compute(
        &self,
        buffer: &SampleBuffer,
        mode: ChannelMode,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Vec<Window>> {
        self.compute_range(buffer, mode, 0..buffer.length(), cancel)
    }

    /// 对指定帧区间计算窗口（窗口从区间起点对齐）
    pub fn compute_range(
        &self,
        buffer: &SampleBuffer,
        mode: ChannelMode,
        range: Range<u64>,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Vec<Window>> {
        let end = range.end.min(buffer.length());
        let start = range.start.min(end);

        let channels: Vec<&[f32]> = match mode {
            ChannelMode::Combined => buffer
                .channels()
                .iter()
                .map(|c| c.as_slice())
                .collect(),
            ChannelMode::Single(idx) => {
                SafetyGuard::check_bounds(idx, buffer.channel_count(), "声道选择")?;
                vec![buffer.channel(idx).unwrap_or(&[])]
            }
        };

        if channels.is_empty() || start == end {
            return Ok(Vec::new());
        }

        let capacity = (end - start).div_ceil(self.hop_frames as u64) as usize;
        let mut windows = Vec::with_capacity(capacity);
        let mut data = ChannelData::new();
        let mut window_start = start;

        while window_start < end {
            cancel.check()?;

            let window_end = (window_start + self.window_frames as u64).min(end);
            data.reset();
            for channel in &channels {
                data.process_samples(&channel[window_start as usize..window_end as usize]);
            }
            windows.push(Window::from_data(window_start, window_end, &data));
            if window_end == end {
                break;
            }
            window_start += self.hop_frames as u64;
        }

        debug_window!(
            "窗口计算完成: mode={:?}, frames={}, hop={}, windows={}",
            mode,
            self.window_frames,
            self.hop_frames,
            windows.len()
        );

        Ok(windows)
    }

    /// 由各声道窗口推导合并窗口（边界完全一致，结果等价于直接合并计算）
    pub fn combine(per_channel: &[Rc<[Window]>]) -> Vec<Window> {
        let Some(first) = per_channel.first() else {
            return Vec::new();
        };
        let channel_count = per_channel.len() as f64;

        (0..first.len())
            .map(|i| {
                let template = first[i];
                let frames = template.frames() as f64;
                let mut sum_squares = 0.0;
                let mut peak = 0.0_f64;
                for channel in per_channel {
                    let w = &channel[i];
                    sum_squares += w.rms * w.rms * frames;
                    peak = peak.max(w.peak);
                }
                let rms = if frames > 0.0 {
                    (sum_squares / (frames * channel_count)).sqrt()
                } else {
                    0.0
                };
                Window {
                    start_sample: template.start_sample,
                    end_sample: template.end_sample,
                    rms,
                    peak,
                    rms_db: amplitude_to_db(rms),
                    peak_db: amplitude_to_db(peak),
                }
            })
            .collect()
    }
}

/// 单次分析内的窗口缓存
///
/// 键为（窗口帧数, 声道模式）。只在一次分析调用内存活，不跨文件共享。
#[derive(Debug, Default)]
pub struct WindowCache {
    entries: HashMap<(usize, ChannelMode), Rc<[Window]>>,
}

impl WindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取（或计算）指定尺寸、模式的窗口
    ///
    /// `Combined` 在所有声道的同尺寸窗口都已缓存时直接推导，避免重复扫描。
    pub fn get(
        &mut self,
        buffer: &SampleBuffer,
        window_frames: usize,
        mode: ChannelMode,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Rc<[Window]>> {
        let processor = WindowProcessor::new(window_frames);
        let key = (processor.window_frames(), mode);
        if let Some(cached) = self.entries.get(&key) {
            return Ok(Rc::clone(cached));
        }

        let windows: Rc<[Window]> = match mode {
            ChannelMode::Combined => {
                let per_channel: Option<Vec<Rc<[Window]>>> = (0..buffer.channel_count())
                    .map(|ch| {
                        self.entries
                            .get(&(key.0, ChannelMode::Single(ch)))
                            .map(Rc::clone)
                    })
                    .collect();
                match per_channel {
                    Some(channels) if !channels.is_empty() => {
                        debug_window!("由{}个声道窗口推导合并窗口", channels.len());
                        Rc::from(WindowProcessor::combine(&channels))
                    }
                    _ => Rc::from(processor.compute(buffer, mode, cancel)?),
                }
            }
            ChannelMode::Single(_) => Rc::from(processor.compute(buffer, mode, cancel)?),
        };

        self.entries.insert(key, Rc::clone(&windows));
        Ok(windows)
    }

    /// 获取所有声道的单声道窗口
    pub fn per_channel(
        &mut self,
        buffer: &SampleBuffer,
        window_frames: usize,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Vec<Rc<[Window]>>> {
        (0..buffer.channel_count())
            .map(|ch| {
                self.get(buffer, window_frames, ChannelMode::Single(ch), cancel)
            })
            .collect()
    }

    /// 已缓存的条目数
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    fn stereo_buffer() -> SampleBuffer {
        let left: Vec<f32> = (0..1000).map(|i| ((i % 7) as f32 - 3.0) * 0.1).collect();
        let right: Vec<f32> = (0..1000).map(|i| ((i % 5) as f32 - 2.0) * 0.2).collect();
        SampleBuffer::new(1000, vec![left, right]).unwrap()
    }

    #[test]
    fn test_db_conversion_edges() {
        assert_eq!(amplitude_to_db(0.0), f64::NEG_INFINITY);
        assert!((amplitude_to_db(1.0)).abs() < 1e-12);
        assert!((amplitude_to_db(0.5) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn test_windows_cover_buffer_without_padding() {
        let buffer = stereo_buffer();
        let processor = WindowProcessor::new(300);
        let windows = processor
            .compute(&buffer, ChannelMode::Combined, &CancellationToken::new())
            .unwrap();

        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].start_sample, 0);
        assert_eq!(windows[3].start_sample, 900);
        assert_eq!(windows[3].end_sample, 1000);
        assert_eq!(windows[3].frames(), 100);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end_sample, pair[1].start_sample);
        }
    }

    #[test]
    fn test_combined_rms_counts_all_channels() {
        let buffer = SampleBuffer::new(10, vec![vec![1.0; 10], vec![0.0; 10]]).unwrap();
        let windows = WindowProcessor::new(10)
            .compute(&buffer, ChannelMode::Combined, &CancellationToken::new())
            .unwrap();
        assert_eq!(windows.len(), 1);
        assert!((windows[0].rms - 0.5_f64.sqrt()).abs() < 1e-12);
        assert_eq!(windows[0].peak, 1.0);
    }

    #[test]
    fn test_digital_silence_is_negative_infinity() {
        let buffer = SampleBuffer::new(100, vec![vec![0.0; 250]]).unwrap();
        let windows = WindowProcessor::new(100)
            .compute(&buffer, ChannelMode::Single(0), &CancellationToken::new())
            .unwrap();
        assert!(windows.iter().all(|w| w.rms_db == f64::NEG_INFINITY));
        assert!(windows.iter().all(|w| w.peak_db == f64::NEG_INFINITY));
        assert!(windows.iter().all(Window::is_digital_silence));
    }

    #[test]
    fn test_combine_matches_direct_computation() {
        let buffer = stereo_buffer();
        let cancel = CancellationToken::new();
        let processor = WindowProcessor::new(128);
        let direct = processor
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
        let derived = WindowProcessor::combine(&per_channel);

        assert_eq!(direct.len(), derived.len());
        for (a, b) in direct.iter().zip(&derived) {
            assert_eq!(a.start_sample, b.start_sample);
            assert_eq!(a.end_sample, b.end_sample);
            assert!((a.rms - b.rms).abs() < 1e-9);
            assert_eq!(a.peak, b.peak);
        }
    }

    #[test]
    fn test_cache_reuses_windows() {
        let buffer = stereo_buffer();
        let cancel = CancellationToken::new();
        let mut cache = WindowCache::new();

        let first = cache
            .get(&buffer, 100, ChannelMode::Combined, &cancel)
            .unwrap();
        let second = cache
            .get(&buffer, 100, ChannelMode::Combined, &cancel)
            .unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_range_computation_aligns_to_range_start() {
        let buffer = stereo_buffer();
        let windows = WindowProcessor::new(100)
            .compute_range(
                &buffer,
                ChannelMode::Single(1),
                250..520,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start_sample, 250);
        assert_eq!(windows[2].end_sample, 520);
    }

    #[test]
    fn test_overlapping_windows_step_by_hop() {
        let buffer = stereo_buffer();
        let processor = WindowProcessor::with_hop(400, 100);
        assert_eq!(processor.hop_frames(), 100);
        let windows = processor
            .compute(&buffer, ChannelMode::Single(0), &CancellationToken::new())
            .unwrap();

        // 起点 0,100,...,600；起点600的窗口到达缓冲区末尾
        assert_eq!(windows.len(), 7);
        assert!(windows
            .windows(2)
            .all(|p| p[1].start_sample - p[0].start_sample == 100));
        assert!(windows.iter().all(|w| w.frames() == 400));
        assert_eq!(windows[6].end_sample, 1000);

        // 步长等于窗口时与首尾相接的窗口完全一致
        let contiguous = WindowProcessor::with_hop(300, 300)
            .compute(&buffer, ChannelMode::Combined, &CancellationToken::new())
            .unwrap();
        let plain = WindowProcessor::new(300)
            .compute(&buffer, ChannelMode::Combined, &CancellationToken::new())
            .unwrap();
        assert_eq!(contiguous, plain);
    }

    #[test]
    fn test_cancellation_stops_within_one_window() {
        let buffer = stereo_buffer();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = WindowProcessor::new(10).compute(&buffer, ChannelMode::Combined, &cancel);
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }

    #[test]
    fn test_invalid_single_channel_index() {
        let buffer = stereo_buffer();
        let result = WindowProcessor::new(10).compute(
            &buffer,
            ChannelMode::Single(5),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }
}
