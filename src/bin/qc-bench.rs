//! qc-bench - 质量指标引擎性能基准工具
//!
//! 在进程内合成确定性测试信号，重复运行完整分析流程，
//! 统计耗时、内存与实时倍率，支持 Markdown / JSON / 表格输出。

use std::f32::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use macinmeter_voice_qc::{AnalysisOptions, AudioAnalyzer, AudioMetrics, PeakMode, SampleBuffer};
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};

// ============================================================================
// 常量定义
// ============================================================================

// 默认采样间隔（毫秒）
const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 50;

// 默认运行次数
const DEFAULT_RUNS: usize = 5;

// 默认信号时长（秒）
const DEFAULT_SECONDS: f64 = 60.0;

// 默认采样率
const DEFAULT_SAMPLE_RATE: u32 = 48000;

// ============================================================================
// CLI 定义
// ============================================================================

#[derive(Parser)]
#[command(name = "qc-bench")]
#[command(about = "语音质量指标引擎基准工具 / Voice QC engine benchmark tool")]
#[command(version)]
struct Cli {
    /// 测试场景：silence, tone, speech, decay, dual-mono, conversation, clipped
    /// Scenario: silence, tone, speech, decay, dual-mono, conversation, clipped
    #[arg(long, short = 's', default_value = "conversation")]
    scenario: Scenario,

    /// 运行次数（默认5）
    /// Number of runs (default: 5)
    #[arg(long, short = 'n', default_value_t = DEFAULT_RUNS)]
    runs: usize,

    /// 合成信号时长（秒，默认60）
    /// Synthesized signal length in seconds (default: 60)
    #[arg(long, short = 'd', default_value_t = DEFAULT_SECONDS)]
    seconds: f64,

    /// 采样率（默认48000）
    /// Sample rate (default: 48000)
    #[arg(long, short = 'r', default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// 使用快速峰值模式
    /// Use the fast (strided) peak mode
    #[arg(long)]
    fast_peak: bool,

    /// 启用实验性分析（混响估计）
    /// Enable experimental analysis (reverb estimate)
    #[arg(long, short = 'x')]
    experimental: bool,

    /// 额外输出最后一次运行的完整指标JSON
    /// Also print the full metrics JSON of the last run
    #[arg(long)]
    dump_metrics: bool,

    /// 内存采样间隔（毫秒，默认50）
    /// Memory sampling interval in ms (default: 50)
    #[arg(long, default_value_t = DEFAULT_SAMPLE_INTERVAL_MS)]
    sample_interval: u64,

    /// 输出格式：markdown, json, table（默认markdown）
    /// Output format: markdown, json, table (default: markdown)
    #[arg(long, short = 'f', default_value = "markdown")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Markdown,
    Json,
    Table,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            _ => Err(format!("Unknown format: {s}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum Scenario {
    Silence,
    Tone,
    Speech,
    Decay,
    DualMono,
    Conversation,
    Clipped,
}

impl Scenario {
    fn name(&self) -> &'static str {
        match self {
            Scenario::Silence => "silence",
            Scenario::Tone => "tone",
            Scenario::Speech => "speech",
            Scenario::Decay => "decay",
            Scenario::DualMono => "dual-mono",
            Scenario::Conversation => "conversation",
            Scenario::Clipped => "clipped",
        }
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silence" => Ok(Scenario::Silence),
            "tone" => Ok(Scenario::Tone),
            "speech" => Ok(Scenario::Speech),
            "decay" => Ok(Scenario::Decay),
            "dual-mono" | "dualmono" => Ok(Scenario::DualMono),
            "conversation" | "conv" => Ok(Scenario::Conversation),
            "clipped" | "clip" => Ok(Scenario::Clipped),
            _ => Err(format!("Unknown scenario: {s}")),
        }
    }
}

// ============================================================================
// 数据结构
// ============================================================================

/// 单次运行结果
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RunResult {
    elapsed_ms: f64,
    peak_memory_kb: u64,
    avg_memory_kb: u64,
    realtime_factor: f64,
}

/// 统计结果
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Statistics {
    median: f64,
    average: f64,
    stddev: f64,
    min: f64,
    max: f64,
}

/// 完整报告
#[derive(Clone, Debug, Serialize, Deserialize)]
struct BenchmarkReport {
    scenario: Scenario,
    sample_rate: u32,
    channels: usize,
    audio_seconds: f64,
    peak_mode: PeakMode,
    experimental: bool,
    runs: usize,
    timestamp: String,
    time_ms: Statistics,
    peak_memory_mb: Statistics,
    avg_memory_mb: Statistics,
    realtime_factor: Statistics,
}

// ============================================================================
// 信号合成
// ============================================================================

/// 确定性线性同余噪声源，输出 [-1, 1)
struct Lcg(u64);

impl Lcg {
    fn next_sample(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }
}

/// 语音样信号：噪声以约4Hz音节节奏调幅，每4秒周期内发声2.5秒
fn speech_like(frames: usize, rate: u32, seed: u64, phrase_offset: f64) -> Vec<f32> {
    let mut noise = Lcg(seed);
    let rate_f = rate as f32;
    (0..frames)
        .map(|i| {
            let t = i as f32 / rate_f;
            let phrase = ((t as f64 + phrase_offset) % 4.0) < 2.5;
            let syllable = 0.5 + 0.5 * (2.0 * PI * 4.0 * t).sin();
            let gain = if phrase { 0.3 * syllable } else { 0.0005 };
            noise.next_sample() * gain
        })
        .collect()
}

fn synthesize(scenario: Scenario, seconds: f64, rate: u32) -> Result<SampleBuffer> {
    let frames = (seconds * rate as f64).round() as usize;
    let rate_f = rate as f32;

    let channels = match scenario {
        Scenario::Silence => vec![vec![0.0f32; frames]; 2],
        Scenario::Tone => {
            let tone: Vec<f32> = (0..frames)
                .map(|i| 0.5 * (2.0 * PI * 1000.0 * i as f32 / rate_f).sin())
                .collect();
            vec![tone]
        }
        Scenario::Speech => vec![speech_like(frames, rate, 7, 0.0)],
        Scenario::Decay => {
            // 每2秒一次噪声脉冲，指数衰减（RT60约0.5秒）
            let mut noise = Lcg(11);
            let burst = rate as usize / 20;
            let decay_per_sample = 60.0 / (0.5 * rate_f);
            let mono: Vec<f32> = (0..frames)
                .map(|i| {
                    let pos = i % (2 * rate as usize);
                    let gain = if pos < burst {
                        0.5
                    } else {
                        0.5 * 10f32.powf(-(decay_per_sample * (pos - burst) as f32) / 20.0)
                    };
                    noise.next_sample() * gain
                })
                .collect();
            vec![mono]
        }
        Scenario::DualMono => {
            let mono = speech_like(frames, rate, 3, 0.0);
            vec![mono.clone(), mono]
        }
        Scenario::Conversation => {
            let host = speech_like(frames, rate, 5, 0.0);
            let guest = speech_like(frames, rate, 9, 2.0);
            // 对侧麦克风拾取约-30dB的串音
            let left: Vec<f32> = host.iter().zip(&guest).map(|(h, g)| h + 0.03 * g).collect();
            let right: Vec<f32> = guest.iter().zip(&host).map(|(g, h)| g + 0.03 * h).collect();
            vec![left, right]
        }
        Scenario::Clipped => {
            let mono: Vec<f32> = (0..frames)
                .map(|i| {
                    let phase = 2.0 * PI * 220.0 * i as f32 / rate_f;
                    (1.4 * phase.sin()).clamp(-1.0, 1.0)
                })
                .collect();
            vec![mono]
        }
    };

    SampleBuffer::new(rate, channels).context("Failed to build buffer / 缓冲区构建失败")
}

// ============================================================================
// 采样器
// ============================================================================

/// 在后台采样本进程内存占用（KB）
fn sample_memory(stop: Arc<AtomicBool>, interval_ms: u64) -> Vec<u64> {
    let mut samples = Vec::new();
    let mut system = System::new();
    let pid = Pid::from_u32(std::process::id());
    let interval = Duration::from_millis(interval_ms.max(1));

    while !stop.load(Ordering::Relaxed) {
        system.refresh_process(pid);
        if let Some(process) = system.process(pid) {
            samples.push(process.memory() / 1024);
        }
        thread::sleep(interval);
    }

    samples
}

// ============================================================================
// 执行引擎
// ============================================================================

/// 运行单次分析
fn run_once(
    buffer: &SampleBuffer,
    options: AnalysisOptions,
    sample_interval: u64,
) -> Result<(RunResult, AudioMetrics)> {
    let stop = Arc::new(AtomicBool::new(false));
    let sampler_stop = Arc::clone(&stop);
    let sampler = thread::spawn(move || sample_memory(sampler_stop, sample_interval));

    let start = Instant::now();
    let metrics = AudioAnalyzer::new(options)
        .analyze(buffer)
        .context("Analysis failed / 分析失败");
    let elapsed = start.elapsed();

    stop.store(true, Ordering::Relaxed);
    let samples = sampler.join().unwrap_or_default();
    let metrics = metrics?;

    let peak_memory_kb = samples.iter().copied().max().unwrap_or(0);
    let avg_memory_kb = if samples.is_empty() {
        0
    } else {
        samples.iter().sum::<u64>() / samples.len() as u64
    };
    let elapsed_s = elapsed.as_secs_f64();
    let realtime_factor = if elapsed_s > 0.0 {
        buffer.duration_seconds() / elapsed_s
    } else {
        0.0
    };

    Ok((
        RunResult {
            elapsed_ms: elapsed_s * 1000.0,
            peak_memory_kb,
            avg_memory_kb,
            realtime_factor,
        },
        metrics,
    ))
}

/// 计算统计值
fn calculate_stats(values: &[f64]) -> Statistics {
    if values.is_empty() {
        return Statistics {
            median: 0.0,
            average: 0.0,
            stddev: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }

    let n = values.len() as f64;
    let average = values.iter().sum::<f64>() / n;

    // 样本标准差 (n-1)
    let variance = if values.len() > 1 {
        values.iter().map(|v| (v - average).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len().is_multiple_of(2) {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    Statistics {
        median,
        average,
        stddev: variance.sqrt(),
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
    }
}

fn generate_report(
    cli: &Cli,
    buffer: &SampleBuffer,
    options: &AnalysisOptions,
    results: &[RunResult],
) -> BenchmarkReport {
    let time: Vec<f64> = results.iter().map(|r| r.elapsed_ms).collect();
    let peak_mem: Vec<f64> = results
        .iter()
        .map(|r| r.peak_memory_kb as f64 / 1024.0)
        .collect();
    let avg_mem: Vec<f64> = results
        .iter()
        .map(|r| r.avg_memory_kb as f64 / 1024.0)
        .collect();
    let realtime: Vec<f64> = results.iter().map(|r| r.realtime_factor).collect();

    BenchmarkReport {
        scenario: cli.scenario,
        sample_rate: buffer.sample_rate(),
        channels: buffer.channel_count(),
        audio_seconds: buffer.duration_seconds(),
        peak_mode: options.peak_mode,
        experimental: options.enable_experimental,
        runs: results.len(),
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        time_ms: calculate_stats(&time),
        peak_memory_mb: calculate_stats(&peak_mem),
        avg_memory_mb: calculate_stats(&avg_mem),
        realtime_factor: calculate_stats(&realtime),
    }
}

// ============================================================================
// 输出格式化
// ============================================================================

fn stats_table(report: &BenchmarkReport, bilingual: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if bilingual {
        table.set_header(vec![
            "Metric / 指标",
            "Median / 中位数",
            "Average / 平均值",
            "StdDev / 标准差",
            "Min / 最小",
            "Max / 最大",
        ]);
        add_stats_row(&mut table, "Time (ms) / 时间", &report.time_ms, 2);
        add_stats_row(
            &mut table,
            "Peak Memory (MB) / 峰值内存",
            &report.peak_memory_mb,
            2,
        );
        add_stats_row(
            &mut table,
            "Avg Memory (MB) / 平均内存",
            &report.avg_memory_mb,
            2,
        );
        add_stats_row(
            &mut table,
            "Realtime (x) / 实时倍率",
            &report.realtime_factor,
            1,
        );
    } else {
        table.set_header(vec!["Metric", "Median", "Average", "StdDev", "Min", "Max"]);
        add_stats_row(&mut table, "Time (ms)", &report.time_ms, 2);
        add_stats_row(&mut table, "Peak Mem (MB)", &report.peak_memory_mb, 2);
        add_stats_row(&mut table, "Avg Mem (MB)", &report.avg_memory_mb, 2);
        add_stats_row(&mut table, "Realtime (x)", &report.realtime_factor, 1);
    }

    table
}

/// 输出 Markdown 格式
fn output_markdown(report: &BenchmarkReport) {
    println!("## Benchmark Report / 性能基准报告\n");
    println!("- **Scenario / 场景**: {}", report.scenario.name());
    println!(
        "- **Signal / 信号**: {:.1} s, {} Hz, {} ch",
        report.audio_seconds, report.sample_rate, report.channels
    );
    println!(
        "- **Options / 选项**: peak={}, experimental={}",
        report.peak_mode.name(),
        report.experimental
    );
    println!("- **Runs / 运行次数**: {}", report.runs);
    println!("- **Timestamp / 时间戳**: {}\n", report.timestamp);

    println!("### Results / 结果\n");
    println!("{}", stats_table(report, true));
}

/// 输出 JSON 格式
fn output_json(report: &BenchmarkReport) {
    println!(
        "{}",
        serde_json::to_string_pretty(report).unwrap_or_default()
    );
}

/// 输出终端表格格式
fn output_table(report: &BenchmarkReport) {
    println!("Benchmark Report / 性能基准报告");
    println!("================================");
    println!(
        "Scenario: {} ({:.1} s, {} Hz, {} ch)",
        report.scenario.name(),
        report.audio_seconds,
        report.sample_rate,
        report.channels
    );
    println!("Runs: {}", report.runs);
    println!("Timestamp: {}\n", report.timestamp);
    println!("{}", stats_table(report, false));
}

/// 添加统计行到表格
fn add_stats_row(table: &mut Table, name: &str, stats: &Statistics, precision: usize) {
    let cell = |v: f64| {
        Cell::new(format!("{v:.precision$}"))
            .set_alignment(CellAlignment::Right)
    };
    table.add_row(vec![
        Cell::new(name),
        cell(stats.median),
        cell(stats.average),
        cell(stats.stddev),
        cell(stats.min),
        cell(stats.max),
    ]);
}

// ============================================================================
// 主函数
// ============================================================================

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    anyhow::ensure!(cli.runs > 0, "runs must be positive / 运行次数必须大于0");
    anyhow::ensure!(
        cli.seconds.is_finite() && cli.seconds >= 0.0,
        "seconds must be non-negative / 时长不能为负"
    );

    let peak_mode = if cli.fast_peak {
        PeakMode::Fast
    } else {
        PeakMode::Accurate
    };
    let options = AnalysisOptions::default()
        .with_peak_mode(peak_mode)
        .with_experimental(cli.experimental);

    let buffer = synthesize(cli.scenario, cli.seconds, cli.sample_rate)?;

    eprintln!(
        "Benchmarking / 基准测试:\n  Scenario: {}\n  Signal: {:.1} s @ {} Hz\n  Runs: {}\n",
        cli.scenario.name(),
        buffer.duration_seconds(),
        buffer.sample_rate(),
        cli.runs
    );

    let mut results = Vec::with_capacity(cli.runs);
    let mut last_metrics = None;
    for i in 0..cli.runs {
        let (result, metrics) = run_once(&buffer, options, cli.sample_interval)?;
        eprintln!(
            "  Run {}/{}: {:.2} ms ({:.1}x realtime)",
            i + 1,
            cli.runs,
            result.elapsed_ms,
            result.realtime_factor
        );
        results.push(result);
        last_metrics = Some(metrics);
    }

    let report = generate_report(&cli, &buffer, &options, &results);
    match cli.format {
        OutputFormat::Markdown => output_markdown(&report),
        OutputFormat::Json => output_json(&report),
        OutputFormat::Table => output_table(&report),
    }

    if cli.dump_metrics
        && let Some(metrics) = last_metrics
    {
        println!("{}", metrics.to_json_pretty()?);
    }

    Ok(())
}
