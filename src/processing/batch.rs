//! 多文件并行分析
//!
//! 使用rayon线程池实现文件级并行：
//! - 精确控制并发度（每个工作线程同一时刻只分析一个文件）
//! - 每个文件使用独立的新分析器，不共享可变状态
//! - 结果按输入顺序返回
//! - 进度通过crossbeam通道以事件流形式转发
//! - 按错误类别统计失败，取消单独计数

use super::analysis_coordinator::{AudioAnalyzer, AudioMetrics};
use super::cancellation::CancellationToken;
use crate::core::constants::parallel_limits;
use crate::core::{AnalysisOptions, SampleBuffer};
use crate::error::{AnalysisError, AnalysisResult, ErrorCategory};
use crossbeam_channel::Sender;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// 批量分析事件
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started {
        index: usize,
        total: usize,
    },
    Progress {
        index: usize,
        stage: String,
        fraction: f64,
    },
    Finished {
        index: usize,
        /// 失败时的错误类别，成功为 None
        error: Option<ErrorCategory>,
    },
}

/// 单个文件的分析结果（保留原始索引）
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub result: AnalysisResult<AudioMetrics>,
}

/// 批量统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// 错误类别 → 文件索引列表
    pub error_stats: BTreeMap<ErrorCategory, Vec<usize>>,
}

/// 批量分析报告
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    pub stats: BatchStats,
    pub elapsed: Duration,
}

/// 线程安全的统计累积
#[derive(Debug, Default)]
struct ParallelBatchStats {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    error_stats: Mutex<BTreeMap<ErrorCategory, Vec<usize>>>,
}

impl ParallelBatchStats {
    fn record(&self, index: usize, result: &AnalysisResult<AudioMetrics>) {
        match result {
            Ok(_) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                if err.is_cancelled() {
                    self.cancelled.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                }
                if let Ok(mut stats) = self.error_stats.lock() {
                    stats
                        .entry(ErrorCategory::from_analysis_error(err))
                        .or_default()
                        .push(index);
                }
            }
        }
    }

    fn snapshot(&self, total: usize) -> BatchStats {
        let mut error_stats = self
            .error_stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default();
        for indices in error_stats.values_mut() {
            indices.sort_unstable();
        }
        BatchStats {
            total,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            error_stats,
        }
    }
}

/// 批量分析器
pub struct BatchAnalyzer {
    options: AnalysisOptions,
    parallel_degree: usize,
}

impl BatchAnalyzer {
    /// 并发度被限制在 [MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE]
    pub fn new(options: AnalysisOptions, parallel_degree: usize) -> Self {
        Self {
            options,
            parallel_degree: parallel_degree.clamp(
                parallel_limits::MIN_PARALLEL_DEGREE,
                parallel_limits::MAX_PARALLEL_DEGREE,
            ),
        }
    }

    #[inline]
    pub fn parallel_degree(&self) -> usize {
        self.parallel_degree
    }

    /// 并行分析所有缓冲区
    ///
    /// 取消令牌被所有文件共享：取消后尚未完成的文件都返回 `Err(Cancelled)`。
    /// 只有线程池创建失败会使整个批次返回错误。
    pub fn analyze_all(
        &self,
        buffers: &[SampleBuffer],
        cancel: &CancellationToken,
        events: Option<Sender<BatchEvent>>,
    ) -> AnalysisResult<BatchReport> {
        let start = Instant::now();
        let total = buffers.len();
        let stats = ParallelBatchStats::default();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_degree)
            .thread_name(|i| format!("qc-worker-{i}"))
            .build()
            .map_err(|e| {
                AnalysisError::ResourceError(format!("线程池创建失败: {e}"))
            })?;

        log::info!(
            "批量分析开始: {} 个文件, 并发度 {}",
            total,
            self.parallel_degree
        );

        let outcomes: Vec<BatchOutcome> = pool.install(|| {
            buffers
                .par_iter()
                .enumerate()
                .map(|(index, buffer)| {
                    let result = self.analyze_one(index, total, buffer, cancel, events.as_ref());
                    stats.record(index, &result);
                    BatchOutcome { index, result }
                })
                .collect()
        });

        let stats = stats.snapshot(total);
        log::info!(
            "批量分析结束: 成功 {}, 失败 {}, 取消 {}",
            stats.succeeded,
            stats.failed,
            stats.cancelled
        );
        for (category, indices) in &stats.error_stats {
            log::warn!(
                "{}: {} 个文件 {:?}",
                category.display_name(),
                indices.len(),
                indices
            );
        }

        Ok(BatchReport {
            outcomes,
            stats,
            elapsed: start.elapsed(),
        })
    }

    fn analyze_one(
        &self,
        index: usize,
        total: usize,
        buffer: &SampleBuffer,
        cancel: &CancellationToken,
        events: Option<&Sender<BatchEvent>>,
    ) -> AnalysisResult<AudioMetrics> {
        if let Some(tx) = events {
            // 接收端已关闭时静默丢弃事件
            let _ = tx.send(BatchEvent::Started { index, total });
        }

        let mut analyzer = AudioAnalyzer::new(self.options)
            .with_cancellation(cancel.clone());
        if let Some(tx) = events.cloned() {
            analyzer = analyzer.with_progress(move |stage, fraction| {
                let _ = tx.send(BatchEvent::Progress {
                    index,
                    stage: stage.to_string(),
                    fraction,
                });
            });
        }

        let result = analyzer.analyze(buffer);

        if let Some(tx) = events {
            let error = result
                .as_ref()
                .err()
                .map(ErrorCategory::from_analysis_error);
            let _ = tx.send(BatchEvent::Finished { index, error });
        }
        result
    }
}
