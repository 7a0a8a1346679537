//! 边界和异常测试
//!
//! 测试零长度、全静音、零声道、非有限样本与超长文件等边界输入


use macinmeter_voice_qc::analyzers::StereoType;
use macinmeter_voice_qc::{
    AnalysisError, AnalysisOptions, AnalysisWarning, AudioAnalyzer, ClipSeverity, SampleBuffer,
};
use signal_fixtures::{log, speech};

fn analyze(buffer: &SampleBuffer) -> macinmeter_voice_qc::AudioMetrics {
    AudioAnalyzer::new(AnalysisOptions::default().with_experimental(true))
        .analyze(buffer)
        .expect("analysis should succeed")
}

// ========== 边界条件测试 ==========

#[test]
fn test_all_silent_stereo_file() {
    let buffer = SampleBuffer::new(48000, vec![vec![0.0; 480_000], vec![0.0; 480_000]]).unwrap();
    let metrics = analyze(&buffer);

    assert_eq!(metrics.peak.peak_db, f64::NEG_INFINITY);
    assert_eq!(metrics.noise_floor.overall_db, f64::NEG_INFINITY);
    assert!(metrics.noise_floor.is_digital_silence());

    let seg = &metrics.segmentation;
    assert!(seg.is_entirely_silent);
    assert!(seg.speech_regions.is_empty());
    assert_eq!(seg.silence_regions.len(), 1);
    assert!((seg.leading_silence_seconds - 10.0).abs() < 1e-9);
    assert_eq!(seg.trailing_silence_seconds, 0.0);
    assert!(seg.interior_silence_regions.is_empty());
    assert_eq!(seg.speech_ratio, 0.0);
    assert_eq!(seg.thresholds.effective_floor_db, -96.0);

    assert_eq!(metrics.clipping.severity, ClipSeverity::None);
    assert_eq!(metrics.stereo.stereo_type, StereoType::DualMono);
    assert!(!metrics.warnings.contains(&AnalysisWarning::EmptyBuffer));
    // 静音文件没有可拟合的衰减，混响结果必须带低置信度警告
    assert!(metrics
        .warnings
        .iter()
        .any(|w| matches!(w, AnalysisWarning::LowReverbConfidence { .. })));

    log(
        format!("全静音文件: 首部静音 {:.1}s", seg.leading_silence_seconds),
        format!(
            "All-silent file: leading silence {:.1}s",
            seg.leading_silence_seconds
        ),
    );
}

#[test]
fn test_all_silent_json_uses_infinity_strings() {
    let buffer = SampleBuffer::new(16000, vec![vec![0.0; 16000]]).unwrap();
    let json = analyze(&buffer).to_json_pretty().unwrap();
    assert!(json.contains("\"peak_db\": \"-Infinity\""));
    assert!(json.contains("\"overall_db\": \"-Infinity\""));
    // 输出必须是合法JSON
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["segmentation"]["is_entirely_silent"], true);
}

#[test]
fn test_zero_length_buffer() {
    let buffer = SampleBuffer::new(44100, vec![Vec::new(), Vec::new()]).unwrap();
    let metrics = analyze(&buffer);

    assert_eq!(metrics.length, 0);
    assert_eq!(metrics.duration_seconds, 0.0);
    assert!(metrics.warnings.contains(&AnalysisWarning::EmptyBuffer));
    assert!(metrics.segmentation.is_entirely_silent);
    assert!(metrics.segmentation.silence_regions.is_empty());
    assert_eq!(metrics.segmentation.leading_silence_seconds, 0.0);
    assert_eq!(metrics.clipping.total_regions, 0);
    assert!(metrics.stereo.conversational_analysis.is_none());

    log(
        "零长度缓冲区降级为哨兵值",
        "Zero-length buffer degrades to sentinel values",
    );
}

#[test]
fn test_no_channels_is_unrecoverable() {
    let buffer = SampleBuffer::new(48000, Vec::new()).unwrap();
    let result = AudioAnalyzer::new(AnalysisOptions::default()).analyze(&buffer);
    assert_eq!(result.unwrap_err(), AnalysisError::NoChannels);
}

#[test]
fn test_single_frame_buffer() {
    let buffer = SampleBuffer::new(48000, vec![vec![0.5]]).unwrap();
    let metrics = analyze(&buffer);
    assert_eq!(metrics.length, 1);
    assert!((metrics.peak.peak - 0.5).abs() < 1e-9);
    let seg = &metrics.segmentation;
    assert_eq!(seg.silence_regions.len() + seg.speech_regions.len(), 1);
}

#[test]
fn test_non_finite_samples_are_counted_and_zeroed() {
    let mut samples = speech(48000, 48000, 3);
    samples[100] = f32::NAN;
    samples[2000] = f32::INFINITY;
    samples[30000] = f32::NEG_INFINITY;
    let buffer = SampleBuffer::new(48000, vec![samples]).unwrap();

    let metrics = analyze(&buffer);
    assert!(metrics
        .warnings
        .contains(&AnalysisWarning::NonFiniteSamples { count: 3 }));
    assert!(metrics.peak.peak.is_finite());
    assert!(metrics.peak.peak < 1.0);
    assert!(metrics.noise_floor.overall_db.is_finite());
    // 非有限样本不计为削波
    assert_eq!(metrics.clipping.clipped_samples, 0);
}

#[test]
fn test_too_many_channels_rejected() {
    let buffer = SampleBuffer::new(8000, vec![vec![0.0; 100]; 33]).unwrap();
    let result = AudioAnalyzer::new(AnalysisOptions::default()).analyze(&buffer);
    assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
}

/// 60秒全零立体声（长文件测试的缩小版，默认运行）
#[test]
fn test_one_minute_silent_stereo() {
    let frames = 60 * 48000;
    let buffer = SampleBuffer::new(48000, vec![vec![0.0; frames], vec![0.0; frames]]).unwrap();
    let metrics = analyze(&buffer);

    assert!((metrics.duration_seconds - 60.0).abs() < 1e-9);
    assert!(metrics.segmentation.is_entirely_silent);
    assert!(
        (metrics.segmentation.leading_silence_seconds - 60.0).abs() < 1e-9
    );
    assert_eq!(metrics.stereo.stereo_type, StereoType::DualMono);
    assert!(metrics.stereo.mic_bleed.is_none());
}

/// 3小时48kHz全零立体声（约4GB内存）
#[cfg(feature = "long-file-tests")]
#[test]
fn test_three_hour_silent_stereo() {
    let frames = 3 * 3600 * 48000;
    log(
        format!("分配 {frames} 帧 × 2 声道"),
        format!("Allocating {frames} frames x 2 channels"),
    );
    let buffer = SampleBuffer::new(48000, vec![vec![0.0; frames], vec![0.0; frames]]).unwrap();

    let start = std::time::Instant::now();
    let metrics = analyze(&buffer);
    let elapsed = start.elapsed();

    assert_eq!(metrics.length, frames as u64);
    assert!((metrics.duration_seconds - 10800.0).abs() < 1e-6);
    assert!(metrics.segmentation.is_entirely_silent);
    assert!(
        (metrics.segmentation.leading_silence_seconds - 10800.0).abs() < 1e-6
    );
    assert_eq!(metrics.stereo.stereo_type, StereoType::DualMono);

    log(
        format!("3小时文件完成: {elapsed:?}"),
        format!("Three-hour file finished in {elapsed:?}"),
    );
}
