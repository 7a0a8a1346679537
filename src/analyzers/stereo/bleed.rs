//! 串音（mic bleed）分析
//!
//! 对每个声道，找出它名义上静音（另一声道活动且主导至少 `dominance_db`）的窗口，
//! 计算它的RMS包络与活动声道包络的相关性，以及平均隔离度（电平差）。
//! 相关性高且隔离度不足时判定为串音。

use crate::core::statistics::pearson;
use crate::core::{StereoConfig, Window};
use crate::utils::db_serde;
use serde::{Deserialize, Serialize};

/// 单个声道的串音统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBleed {
    /// 名义静音的声道
    pub channel: usize,
    /// 活动（串音来源）声道
    pub source_channel: usize,
    pub windows_analyzed: usize,
    pub envelope_correlation: f64,
    /// 平均隔离度（dB），没有可分析窗口时为 +inf
    #[serde(with = "db_serde")]
    pub mean_isolation_db: f64,
    pub bleed_detected: bool,
}

/// 串音分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicBleedAnalysis {
    pub channels: Vec<ChannelBleed>,
    pub bleed_detected: bool,
    /// 各声道中最差（最小）的隔离度
    #[serde(with = "db_serde")]
    pub worst_isolation_db: f64,
}

/// 分析两个声道之间的双向串音
///
/// `active_thresholds_db[c]` 为声道 c 的语音活动阈值，`floor_clamp_db` 用于把 -inf 电平抬升为有限值。
pub fn analyze_bleed(
    channels: [&[Window]; 2],
    active_thresholds_db: [f64; 2],
    floor_clamp_db: f64,
    config: &StereoConfig,
) -> MicBleedAnalysis {
    let results: Vec<ChannelBleed> = [(1usize, 0usize), (0, 1)]
        .into_iter()
        .map(|(quiet, source)| {
            channel_bleed(
                quiet,
                source,
                channels[quiet],
                channels[source],
                active_thresholds_db[source],
                floor_clamp_db,
                config,
            )
        })
        .collect();

    let bleed_detected = results.iter().any(|c| c.bleed_detected);
    let worst_isolation_db = results
        .iter()
        .map(|c| c.mean_isolation_db)
        .fold(f64::INFINITY, f64::min);

    MicBleedAnalysis {
        channels: results,
        bleed_detected,
        worst_isolation_db,
    }
}

fn channel_bleed(
    quiet: usize,
    source: usize,
    quiet_windows: &[Window],
    source_windows: &[Window],
    source_threshold_db: f64,
    floor_clamp_db: f64,
    config: &StereoConfig,
) -> ChannelBleed {
    let mut quiet_envelope = Vec::new();
    let mut source_envelope = Vec::new();
    let mut isolation_sum = 0.0;

    for (q, s) in quiet_windows.iter().zip(source_windows) {
        let quiet_db = q.rms_db.max(floor_clamp_db);
        let source_db = s.rms_db.max(floor_clamp_db);
        if s.rms_db > source_threshold_db && source_db - quiet_db >= config.dominance_db {
            quiet_envelope.push(q.rms);
            source_envelope.push(s.rms);
            isolation_sum += source_db - quiet_db;
        }
    }

    let windows_analyzed = quiet_envelope.len();
    if windows_analyzed == 0 {
        return ChannelBleed {
            channel: quiet,
            source_channel: source,
            windows_analyzed,
            envelope_correlation: 0.0,
            mean_isolation_db: f64::INFINITY,
            bleed_detected: false,
        };
    }

    let envelope_correlation = pearson(&quiet_envelope, &source_envelope);
    let mean_isolation_db = isolation_sum / windows_analyzed as f64;
    let bleed_detected = windows_analyzed >= config.bleed_min_windows
        && envelope_correlation >= config.bleed_correlation_threshold
        && mean_isolation_db < config.bleed_max_isolation_db;

    ChannelBleed {
        channel: quiet,
        source_channel: source,
        windows_analyzed,
        envelope_correlation,
        mean_isolation_db,
        bleed_detected,
    }
}
