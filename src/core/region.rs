//! 时间区间（静音、语音、削波、重叠）
//!
//! 不变量：`end_time > start_time`；同类型、同声道的区间按时间排序且互不重叠。
//! `merge_regions` 负责归一化，时间线转换的往返结果是幂等的。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 时间区间（秒）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// 所属声道，None 表示跨声道（合并分析）
    pub channel: Option<usize>,
}

impl Region {
    /// 创建区间，`end <= start` 或非有限值时返回 None
    pub fn new(start_time: f64, end_time: f64, channel: Option<usize>) -> Option<Self> {
        if !start_time.is_finite() || !end_time.is_finite() || end_time <= start_time {
            return None;
        }
        Some(Self {
            start_time,
            end_time,
            duration: end_time - start_time,
            channel,
        })
    }

    /// 由帧区间 [start_frame, end_frame) 创建区间
    pub fn from_frames(
        start_frame: u64,
        end_frame: u64,
        sample_rate: u32,
        channel: Option<usize>,
    ) -> Option<Self> {
        let rate = sample_rate as f64;
        Self::new(start_frame as f64 / rate, end_frame as f64 / rate, channel)
    }

    #[inline]
    pub fn overlaps_or_touches(&self, other: &Region) -> bool {
        self.channel == other.channel
            && self.start_time <= other.end_time
            && other.start_time <= self.end_time
    }

    fn order(a: &Region, b: &Region) -> Ordering {
        a.channel
            .cmp(&b.channel)
            .then(a.start_time.total_cmp(&b.start_time))
            .then(a.end_time.total_cmp(&b.end_time))
    }
}

/// 归一化区间列表：丢弃无效区间，按（声道, 起点）排序，合并重叠或相接的区间
pub fn merge_regions(regions: &[Region]) -> Vec<Region> {
    let mut sorted: Vec<Region> = regions
        .iter()
        .filter_map(|r| Region::new(r.start_time, r.end_time, r.channel))
        .collect();
    sorted.sort_by(Region::order);

    let mut merged: Vec<Region> = Vec::with_capacity(sorted.len());
    for region in sorted {
        match merged.last_mut() {
            Some(last) if last.overlaps_or_touches(&region) => {
                last.end_time = last.end_time.max(region.end_time);
                last.duration = last.end_time - last.start_time;
            }
            _ => merged.push(region),
        }
    }
    merged
}

/// 时间线边界事件
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub time: f64,
    pub channel: Option<usize>,
    /// true = 区间开始，false = 区间结束
    pub active: bool,
}

/// 区间列表 → 合并后的时间线（按声道、时间排序的开始/结束事件）
pub fn regions_to_timeline(regions: &[Region]) -> Vec<TimelineEvent> {
    merge_regions(regions)
        .into_iter()
        .flat_map(|r| {
            [
                TimelineEvent {
                    time: r.start_time,
                    channel: r.channel,
                    active: true,
                },
                TimelineEvent {
                    time: r.end_time,
                    channel: r.channel,
                    active: false,
                },
            ]
        })
        .collect()
}

/// 时间线 → 区间列表
///
/// 对每个声道维护活动深度，深度从0变为正时开区间，回到0时闭区间。
/// 事件顺序不要求已排序；同一时刻的开始事件先于结束事件处理。
pub fn timeline_to_regions(events: &[TimelineEvent]) -> Vec<Region> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| {
        a.channel
            .cmp(&b.channel)
            .then(a.time.total_cmp(&b.time))
            .then(b.active.cmp(&a.active))
    });

    let mut regions = Vec::new();
    let mut current_channel: Option<Option<usize>> = None;
    let mut depth: usize = 0;
    let mut open_time = 0.0;

    for event in sorted {
        if current_channel != Some(event.channel) {
            current_channel = Some(event.channel);
            depth = 0;
        }
        if event.active {
            if depth == 0 {
                open_time = event.time;
            }
            depth += 1;
        } else if depth > 0 {
            depth -= 1;
            if depth == 0
                && let Some(region) = Region::new(open_time, event.time, event.channel)
            {
                regions.push(region);
            }
        }
    }

    merge_regions(&regions)
}

/// 区间列表总时长
pub fn total_duration(regions: &[Region]) -> f64 {
    regions.iter().map(|r| r.duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(start: f64, end: f64, channel: Option<usize>) -> Region {
        Region::new(start, end, channel).unwrap()
    }

    #[test]
    fn test_invalid_regions_rejected() {
        assert!(Region::new(1.0, 1.0, None).is_none());
        assert!(Region::new(2.0, 1.0, None).is_none());
        assert!(Region::new(0.0, f64::INFINITY, None).is_none());
        assert_eq!(
            Region::from_frames(0, 480, 48000, Some(1)).unwrap().duration,
            0.01
        );
    }

    #[test]
    fn test_merge_overlapping_and_touching() {
        let merged = merge_regions(&[
            region(2.0, 3.0, None),
            region(0.0, 1.0, None),
            region(1.0, 1.5, None),
            region(2.5, 4.0, None),
        ]);
        assert_eq!(merged, vec![region(0.0, 1.5, None), region(2.0, 4.0, None)]);
    }

    #[test]
    fn test_merge_keeps_channels_apart() {
        let merged = merge_regions(&[
            region(0.0, 1.0, Some(1)),
            region(0.5, 2.0, Some(0)),
            region(0.5, 2.0, Some(1)),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], region(0.5, 2.0, Some(0)));
        assert_eq!(merged[1], region(0.0, 2.0, Some(1)));
    }

    #[test]
    fn test_timeline_round_trip_is_idempotent() {
        let input = vec![
            region(3.0, 4.0, Some(0)),
            region(0.0, 2.0, Some(0)),
            region(1.0, 2.5, Some(0)),
            region(0.2, 0.4, Some(1)),
        ];
        let once = timeline_to_regions(&regions_to_timeline(&input));
        let twice = timeline_to_regions(&regions_to_timeline(&once));
        assert_eq!(once, twice);
        assert_eq!(once, merge_regions(&input));
    }

    #[test]
    fn test_unbalanced_timeline_ignores_stray_end() {
        let events = [
            TimelineEvent {
                time: 0.5,
                channel: None,
                active: false,
            },
            TimelineEvent {
                time: 1.0,
                channel: None,
                active: true,
            },
            TimelineEvent {
                time: 2.0,
                channel: None,
                active: false,
            },
        ];
        assert_eq!(timeline_to_regions(&events), vec![region(1.0, 2.0, None)]);
    }

    #[test]
    fn test_total_duration() {
        let regions = [region(0.0, 1.0, None), region(2.0, 2.5, None)];
        assert!((total_duration(&regions) - 1.5).abs() < 1e-12);
    }
}
