//! 完整分析流程场景测试
//!
//! 用合成信号验证静音分段、峰值模式、削波分级、混响估计与配置覆盖


use macinmeter_voice_qc::core::{regions_to_timeline, timeline_to_regions};
use macinmeter_voice_qc::{
    AnalysisConfig, AnalysisOptions, AudioAnalyzer, AudioMetrics, ClipSeverity, PeakMode,
    ReverbInterpretation, SampleBuffer,
};
use signal_fixtures::{
    decay_burst, log, mono, noise, seconds_to_frames, speech, speech_with_pauses, tone,
};

const RATE: u32 = 16000;

fn analyze_with(buffer: &SampleBuffer, options: AnalysisOptions) -> AudioMetrics {
    AudioAnalyzer::new(options)
        .analyze(buffer)
        .expect("analysis should succeed")
}

/// 1s底噪 + 3s语音 + 1s停顿 + 3s语音 + 1.5s底噪
fn interview_take() -> SampleBuffer {
    mono(
        RATE,
        speech_with_pauses(
            RATE,
            &[(1.0, false), (3.0, true), (1.0, false), (3.0, true), (1.5, false)],
        ),
    )
}

// ========== 静音分段 ==========

#[test]
fn test_segmentation_of_interview_take() {
    let metrics = analyze_with(&interview_take(), AnalysisOptions::default());
    let seg = &metrics.segmentation;

    assert!(
        (-88.0..-82.0).contains(&metrics.noise_floor.overall_db),
        "noise floor = {}",
        metrics.noise_floor.overall_db
    );
    assert!(!seg.is_entirely_silent);
    assert_eq!(seg.speech_regions.len(), 2);
    assert_eq!(seg.silence_regions.len(), 3);
    assert!((seg.leading_silence_seconds - 1.0).abs() < 1e-9);
    assert!((seg.trailing_silence_seconds - 1.5).abs() < 1e-9);

    assert_eq!(seg.interior_silence_regions.len(), 1);
    let pause = &seg.interior_silence_regions[0];
    assert!((pause.start_time - 4.0).abs() < 1e-9);
    assert!((pause.end_time - 5.0).abs() < 1e-9);

    assert!((seg.speech_ratio - 6.0 / 9.5).abs() < 1e-9);
    assert!((seg.total_speech_seconds() - 6.0).abs() < 1e-9);
    assert!((seg.total_silence_seconds() - 3.5).abs() < 1e-9);

    log(
        format!("分段: 语音占比 {:.3}", seg.speech_ratio),
        format!("Segmentation: speech ratio {:.3}", seg.speech_ratio),
    );
}

#[test]
fn test_short_pause_is_absorbed_into_speech() {
    // 100ms 停顿短于最短静音（250ms），不应产生内部静音
    let samples = speech_with_pauses(
        RATE,
        &[(1.0, false), (2.0, true), (0.1, false), (2.0, true), (1.0, false)],
    );
    let metrics = analyze_with(&mono(RATE, samples), AnalysisOptions::default());
    let seg = &metrics.segmentation;
    assert_eq!(seg.speech_regions.len(), 1);
    assert!(seg.interior_silence_regions.is_empty());
    assert!((seg.leading_silence_seconds - 1.0).abs() < 1e-9);
    assert!((seg.trailing_silence_seconds - 1.0).abs() < 1e-9);
    let region = &seg.speech_regions[0];
    assert!((region.duration - 4.1).abs() < 1e-9);
}

#[test]
fn test_digital_zero_head_does_not_hide_room_tone() {
    // 1.5s 补零 + 语音/约-65 dB底噪交替（各2s），补零约占13%的窗口
    let mut samples = vec![0.0f32; seconds_to_frames(1.5, RATE)];
    for (index, speaking) in [true, false, true, false, true].into_iter().enumerate() {
        let frames = seconds_to_frames(2.0, RATE);
        if speaking {
            samples.extend(speech(frames, RATE, 60 + index as u64));
        } else {
            samples.extend(noise(frames, 70 + index as u64, 1e-3));
        }
    }

    let metrics = analyze_with(&mono(RATE, samples), AnalysisOptions::default());
    let floor = metrics.noise_floor.overall_db;
    assert!((-67.0..-63.0).contains(&floor), "noise floor = {floor}");

    let seg = &metrics.segmentation;
    assert_eq!(seg.speech_regions.len(), 3);
    assert_eq!(seg.interior_silence_regions.len(), 2);
    assert!((seg.leading_silence_seconds - 1.5).abs() < 1e-9);
    assert_eq!(seg.trailing_silence_seconds, 0.0);
    assert!((seg.speech_ratio - 6.0 / 11.5).abs() < 1e-9);

    log(
        format!("补零开头: 噪声底 {floor:.1} dB"),
        format!("Zero-padded head: noise floor {floor:.1} dB"),
    );
}

#[test]
fn test_silence_regions_survive_timeline_round_trip() {
    let metrics = analyze_with(&interview_take(), AnalysisOptions::default());
    let regions = &metrics.segmentation.silence_regions;

    let events = regions_to_timeline(regions);
    assert_eq!(events.len(), regions.len() * 2);
    assert!(events.windows(2).all(|p| p[0].time <= p[1].time));

    let rebuilt = timeline_to_regions(&events);
    assert_eq!(rebuilt.len(), regions.len());
    for (a, b) in rebuilt.iter().zip(regions) {
        assert!((a.start_time - b.start_time).abs() < 1e-12);
        assert!((a.end_time - b.end_time).abs() < 1e-12);
        assert_eq!(a.channel, b.channel);
    }
}

// ========== 峰值模式 ==========

#[test]
fn test_fast_peak_tracks_accurate_peak() {
    let rate = 48000;
    let signals: Vec<Vec<f32>> = (0..10)
        .map(|i| {
            let gain = 0.1 + 0.09 * i as f32;
            if i % 2 == 0 {
                noise(rate as usize, 40 + i as u64, gain)
            } else {
                tone(rate as usize, rate, 50.0 + 20.0 * i as f64, gain as f64)
            }
        })
        .collect();

    let mut within = 0;
    for samples in signals {
        let buffer = mono(rate, samples);
        let accurate = analyze_with(&buffer, AnalysisOptions::default());
        let fast = analyze_with(
            &buffer,
            AnalysisOptions::default().with_peak_mode(PeakMode::Fast),
        );
        assert!(fast.peak.is_approximate());
        assert!(fast.peak.peak <= accurate.peak.peak);
        if (accurate.peak.peak_db - fast.peak.peak_db).abs() < 0.5 {
            within += 1;
        }
    }

    assert!(within >= 9, "only {within}/10 fast peaks within 0.5 dB");
    log(
        format!("快速峰值: {within}/10 在 0.5 dB 内"),
        format!("Fast peak: {within}/10 within 0.5 dB"),
    );
}

// ========== 削波 ==========

#[test]
fn test_sustained_clip_is_critical() {
    let mut samples = speech(2 * RATE as usize, RATE, 1);
    // 50 ms 满量程直流，远长于爆破音上限 20 ms
    samples.extend(std::iter::repeat_n(1.0f32, RATE as usize / 20));
    samples.extend(speech(RATE as usize, RATE, 2));

    let metrics = analyze_with(&mono(RATE, samples), AnalysisOptions::default());
    let clipping = &metrics.clipping;

    assert_eq!(clipping.severity, ClipSeverity::Critical);
    assert_eq!(clipping.sustained_count, 1);
    assert_eq!(clipping.plosive_count, 0);
    assert_eq!(clipping.clipped_samples, RATE as u64 / 20);
    assert!((clipping.regions[0].region.start_time - 2.0).abs() < 1e-9);
    assert!((clipping.clipped_duration_seconds - 0.05).abs() < 1e-9);
}

#[test]
fn test_plosive_clip_counts_grade_severity() {
    let spiked = |spikes: usize| {
        let mut samples = speech(3 * RATE as usize, RATE, 8);
        for k in 0..spikes {
            let start = 1000 + k * 1500;
            for s in &mut samples[start..start + 10] {
                *s = -1.0;
            }
        }
        mono(RATE, samples)
    };

    let few = analyze_with(&spiked(5), AnalysisOptions::default());
    assert_eq!(few.clipping.plosive_count, 5);
    assert_eq!(few.clipping.severity, ClipSeverity::Minor);

    let many = analyze_with(&spiked(25), AnalysisOptions::default());
    assert_eq!(many.clipping.plosive_count, 25);
    assert_eq!(many.clipping.sustained_count, 0);
    assert_eq!(many.clipping.severity, ClipSeverity::Warning);
}

// ========== 混响（实验性） ==========

#[test]
fn test_reverb_rt60_of_exponential_decays() {
    let rate = 48000;
    let window = 1008;
    let mut samples = Vec::new();
    for _ in 0..4 {
        samples.extend(decay_burst(rate, window, 0.5, 20, 1.5));
    }

    let buffer = mono(rate, samples);
    let metrics = analyze_with(&buffer, AnalysisOptions::default().with_experimental(true));
    let reverb = metrics.reverb.expect("reverb computed when experimental");

    assert_eq!(reverb.onsets_detected, 4);
    assert_eq!(reverb.decays_fitted, 4);
    assert!(
        (reverb.rt60_seconds - 0.5).abs() < 0.02,
        "rt60 = {}",
        reverb.rt60_seconds
    );
    assert_eq!(reverb.interpretation, ReverbInterpretation::Moderate);
    assert!(reverb.median_decay_slope_db_per_s < 0.0);
    assert!(reverb.confidence > 0.35 && reverb.confidence <= 0.41);

    log(
        format!(
            "RT60 = {:.3}s, 置信度 {:.2}",
            reverb.rt60_seconds, reverb.confidence
        ),
        format!(
            "RT60 = {:.3}s, confidence {:.2}",
            reverb.rt60_seconds, reverb.confidence
        ),
    );
}

#[test]
fn test_reverb_rt60_of_dry_booth_decays() {
    // RT60 0.15 s：30 dB 跨度在21 ms窗口上只有不到5个点
    let rate = 48000;
    let mut samples = Vec::new();
    for _ in 0..5 {
        samples.extend(decay_burst(rate, 1008, 0.15, 20, 1.0));
    }

    let metrics = analyze_with(
        &mono(rate, samples),
        AnalysisOptions::default().with_experimental(true),
    );
    let reverb = metrics.reverb.expect("reverb computed when experimental");

    assert_eq!(reverb.onsets_detected, 5);
    assert_eq!(reverb.decays_fitted, 5);
    assert!(
        (reverb.rt60_seconds - 0.15).abs() < 0.02,
        "rt60 = {}",
        reverb.rt60_seconds
    );
    assert_eq!(reverb.interpretation, ReverbInterpretation::Dry);
    assert!(!reverb.is_low_confidence());
}

#[test]
fn test_reverb_skipped_without_experimental() {
    let metrics = analyze_with(&interview_take(), AnalysisOptions::default());
    assert!(metrics.reverb.is_none());
    assert!(!metrics.experimental_enabled);
}

// ========== 配置 ==========

#[test]
fn test_json_config_override_changes_clip_threshold() {
    let config: AnalysisConfig =
        serde_json::from_str(r#"{ "clipping": { "threshold": 0.25 } }"#).unwrap();
    assert_eq!(config.segmentation, AnalysisConfig::default().segmentation);

    let buffer = mono(RATE, speech(2 * RATE as usize, RATE, 4));
    let strict = analyze_with(&buffer, AnalysisOptions::default().with_config(config));
    let default = analyze_with(&buffer, AnalysisOptions::default());

    assert!(strict.clipping.has_clipping());
    assert_eq!(strict.clipping.threshold, 0.25);
    assert!(!default.clipping.has_clipping());
}

#[test]
fn test_metrics_serialize_round_trip() {
    let metrics = analyze_with(
        &interview_take(),
        AnalysisOptions::default().with_experimental(true),
    );
    let json = metrics.to_json_pretty().unwrap();
    let back: AudioMetrics = serde_json::from_str(&json).unwrap();

    assert_eq!(back.length, metrics.length);
    assert_eq!(back.warnings, metrics.warnings);
    assert_eq!(back.stereo.stereo_type, metrics.stereo.stereo_type);
    assert_eq!(back.clipping.severity, metrics.clipping.severity);
    assert_eq!(
        back.segmentation.speech_regions.len(),
        metrics.segmentation.speech_regions.len()
    );
    assert!(
        (back.segmentation.speech_ratio - metrics.segmentation.speech_ratio).abs() < 1e-12
    );
    assert!(
        (back.noise_floor.overall_db - metrics.noise_floor.overall_db).abs() < 1e-9
    );
    let (a, b) = (back.reverb.unwrap(), metrics.reverb.unwrap());
    assert_eq!(a.is_low_confidence(), b.is_low_confidence());
    assert_eq!(a.interpretation, b.interpretation);
}
