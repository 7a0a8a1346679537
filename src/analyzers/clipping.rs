//! 削波检测
//!
//! 样本级扫描（不分窗口）：`|x| > threshold` 的样本被标记，
//! 同一声道上连续被标记的样本合并为一个削波区间。
//!
//! 分类（分界为固定20 ms，与采样率无关）：
//! - `< 20 ms`：爆破音削波（短暂，通常可容忍）
//! - `≥ 20 ms`：持续削波（增益设置失误）
//!
//! 严重度按优先级判定：存在持续削波 → Critical；
//! 否则爆破音区间数 > 20 → Warning；否则有爆破音 → Minor；否则 None。

use crate::core::{ClippingConfig, Region, SampleBuffer};
use crate::error::AnalysisResult;
use crate::processing::CancellationToken;
use serde::{Deserialize, Serialize};

/// 削波区间类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Plosive,
    Sustained,
}

/// 总体削波严重度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipSeverity {
    None,
    Minor,
    Warning,
    Critical,
}

impl ClipSeverity {
    pub fn name(&self) -> &'static str {
        match self {
            ClipSeverity::None => "none",
            ClipSeverity::Minor => "minor",
            ClipSeverity::Warning => "warning",
            ClipSeverity::Critical => "critical",
        }
    }
}

/// 单个削波区间（`region.channel` 总是 `Some`）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClippedRegion {
    #[serde(flatten)]
    pub region: Region,
    pub sample_count: u64,
    pub kind: ClipKind,
}

/// 单声道统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelClipping {
    pub channel: usize,
    pub clipped_samples: u64,
    pub plosive_regions: usize,
    pub sustained_regions: usize,
}

/// 削波检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippingResult {
    pub threshold: f32,
    /// 最多 `max_reported_regions` 个区间，按（声道, 时间）排序
    pub regions: Vec<ClippedRegion>,
    pub regions_truncated: bool,
    /// 区间总数（精确，不受截断影响）
    pub total_regions: usize,
    pub plosive_count: usize,
    pub sustained_count: usize,
    pub clipped_samples: u64,
    /// 所有声道削波区间时长之和（秒）
    pub clipped_duration_seconds: f64,
    pub per_channel: Vec<ChannelClipping>,
    pub severity: ClipSeverity,
}

impl ClippingResult {
    #[inline]
    pub fn has_clipping(&self) -> bool {
        self.total_regions > 0
    }
}

/// 运行中的削波区间
#[derive(Debug, Clone, Copy)]
struct OpenRun {
    start: u64,
    length: u64,
}

pub struct ClippingAnalyzer {
    config: ClippingConfig,
    block_frames: usize,
}

impl ClippingAnalyzer {
    pub fn new(config: ClippingConfig, block_frames: usize) -> Self {
        Self {
            config,
            block_frames: block_frames.max(1),
        }
    }

    pub fn analyze(
        &self,
        buffer: &SampleBuffer,
        cancel: &CancellationToken,
    ) -> AnalysisResult<ClippingResult> {
        let sample_rate = buffer.sample_rate();
        let plosive_max_frames = self.config.plosive_max_ms * sample_rate as f64 / 1000.0;

        let mut result = ClippingResult {
            threshold: self.config.threshold,
            regions: Vec::new(),
            regions_truncated: false,
            total_regions: 0,
            plosive_count: 0,
            sustained_count: 0,
            clipped_samples: 0,
            clipped_duration_seconds: 0.0,
            per_channel: Vec::with_capacity(buffer.channel_count()),
            severity: ClipSeverity::None,
        };

        for (channel, samples) in buffer.channels().iter().enumerate() {
            let mut stats = ChannelClipping {
                channel,
                ..Default::default()
            };
            let mut open: Option<OpenRun> = None;

            for (block_index, block) in samples.chunks(self.block_frames).enumerate() {
                cancel.check()?;
                let base = (block_index * self.block_frames) as u64;

                for (offset, &sample) in block.iter().enumerate() {
                    // 非有限样本按0处理，不会被标记
                    if sample.is_finite() && sample.abs() > self.config.threshold {
                        match open.as_mut() {
                            Some(run) => run.length += 1,
                            None => {
                                open = Some(OpenRun {
                                    start: base + offset as u64,
                                    length: 1,
                                })
                            }
                        }
                    } else if let Some(run) = open.take() {
                        self.close_run(
                            run,
                            channel,
                            sample_rate,
                            plosive_max_frames,
                            &mut stats,
                            &mut result,
                        );
                    }
                }
            }
            if let Some(run) = open.take() {
                self.close_run(
                    run,
                    channel,
                    sample_rate,
                    plosive_max_frames,
                    &mut stats,
                    &mut result,
                );
            }

            result.per_channel.push(stats);
        }

        result.severity = self.severity(result.plosive_count, result.sustained_count);
        Ok(result)
    }

    fn close_run(
        &self,
        run: OpenRun,
        channel: usize,
        sample_rate: u32,
        plosive_max_frames: f64,
        stats: &mut ChannelClipping,
        result: &mut ClippingResult,
    ) {
        let kind = if (run.length as f64) < plosive_max_frames {
            stats.plosive_regions += 1;
            result.plosive_count += 1;
            ClipKind::Plosive
        } else {
            stats.sustained_regions += 1;
            result.sustained_count += 1;
            ClipKind::Sustained
        };

        stats.clipped_samples += run.length;
        result.clipped_samples += run.length;
        result.total_regions += 1;
        result.clipped_duration_seconds += run.length as f64 / sample_rate as f64;

        if result.regions.len() >= self.config.max_reported_regions {
            result.regions_truncated = true;
            return;
        }
        if let Some(region) = Region::from_frames(
            run.start,
            run.start + run.length,
            sample_rate,
            Some(channel),
        ) {
            result.regions.push(ClippedRegion {
                region,
                sample_count: run.length,
                kind,
            });
        }
    }

    fn severity(&self, plosive_count: usize, sustained_count: usize) -> ClipSeverity {
        if sustained_count > 0 {
            ClipSeverity::Critical
        } else if plosive_count > self.config.plosive_warning_count {
            ClipSeverity::Warning
        } else if plosive_count > 0 {
            ClipSeverity::Minor
        } else {
            ClipSeverity::None
        }
    }
}
