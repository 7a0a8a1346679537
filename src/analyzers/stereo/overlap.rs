//! 对话重叠检测
//!
//! 两个声道同时处于语音活动、且电平差在容差内的窗口视为重叠（双方同时说话）。
//! 报告重叠占活动窗口的比例、合并后的重叠区间，以及同步漂移估计。

use super::drift::SyncDriftEstimate;
use crate::core::{Region, Window, merge_regions};
use serde::{Deserialize, Serialize};

/// 对话分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationalAnalysis {
    /// 重叠窗口占活动窗口（任一声道活动）的百分比（0-100）
    pub overlap_percentage: f64,
    pub overlap_seconds: f64,
    pub overlap_regions: Vec<Region>,
    pub active_windows: usize,
    pub overlap_windows: usize,
    /// 互相关峰值不足时为 None
    pub sync_drift: Option<SyncDriftEstimate>,
}

/// 重叠统计（不含漂移）
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapStats {
    pub overlap_percentage: f64,
    pub overlap_seconds: f64,
    pub overlap_regions: Vec<Region>,
    pub active_windows: usize,
    pub overlap_windows: usize,
}

impl OverlapStats {
    pub fn with_drift(self, sync_drift: Option<SyncDriftEstimate>) -> ConversationalAnalysis {
        ConversationalAnalysis {
            overlap_percentage: self.overlap_percentage,
            overlap_seconds: self.overlap_seconds,
            overlap_regions: self.overlap_regions,
            active_windows: self.active_windows,
            overlap_windows: self.overlap_windows,
            sync_drift,
        }
    }
}

pub fn detect_overlap(
    channels: [&[Window]; 2],
    active_thresholds_db: [f64; 2],
    level_tolerance_db: f64,
    sample_rate: u32,
) -> OverlapStats {
    let mut active_windows = 0usize;
    let mut overlap_windows = 0usize;
    let mut overlap_frames = 0u64;
    let mut regions: Vec<Region> = Vec::new();
    let mut open: Option<(u64, u64)> = None;

    for (a, b) in channels[0].iter().zip(channels[1]) {
        let active_a = a.rms_db > active_thresholds_db[0];
        let active_b = b.rms_db > active_thresholds_db[1];
        if active_a || active_b {
            active_windows += 1;
        }

        let overlapping =
            active_a && active_b && (a.rms_db - b.rms_db).abs() <= level_tolerance_db;
        if overlapping {
            overlap_windows += 1;
            overlap_frames += a.frames();
            open = match open {
                Some((start, _)) => Some((start, a.end_sample)),
                None => Some((a.start_sample, a.end_sample)),
            };
        } else if let Some((start, end)) = open.take() {
            regions.extend(Region::from_frames(start, end, sample_rate, None));
        }
    }
    if let Some((start, end)) = open.take() {
        regions.extend(Region::from_frames(start, end, sample_rate, None));
    }

    let overlap_percentage = if active_windows > 0 {
        overlap_windows as f64 / active_windows as f64 * 100.0
    } else {
        0.0
    };

    OverlapStats {
        overlap_percentage,
        overlap_seconds: overlap_frames as f64 / sample_rate as f64,
        overlap_regions: merge_regions(&regions),
        active_windows,
        overlap_windows,
    }
}
