//! 窗口dB分布与低分位统计
//!
//! 收集窗口RMS的dB值，按最近秩（nearest-rank）取分位数：
//! - 分位结果总是分布中真实存在的某个有限值，不做插值
//! - -inf（数字静音窗口）只计数，不参与分位排序
//! - 没有任何有限值（全部静音或空分布）时结果为 -inf

/// 窗口dB值分布
#[derive(Debug, Clone, Default)]
pub struct DbDistribution {
    /// 有限dB值
    values: Vec<f64>,
    silent_count: usize,
    sorted: bool,
}

impl DbDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            silent_count: 0,
            sorted: true,
        }
    }

    /// 添加一个dB值，NaN 与 +inf 被忽略，-inf 计为静音
    #[inline]
    pub fn add(&mut self, db: f64) {
        if db == f64::NEG_INFINITY {
            self.silent_count += 1;
        } else if db.is_finite() {
            self.values.push(db);
            self.sorted = false;
        }
    }

    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        for db in values {
            self.add(db);
        }
    }

    /// 值总数（含静音）
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len() + self.silent_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 有限值个数
    #[inline]
    pub fn finite_count(&self) -> usize {
        self.values.len()
    }

    /// -inf 值的个数
    #[inline]
    pub fn silent_count(&self) -> usize {
        self.silent_count
    }

    /// 分布中没有有限值（空分布也视为静音）
    #[inline]
    pub fn is_all_silent(&self) -> bool {
        self.values.is_empty()
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.values.sort_unstable_by(f64::total_cmp);
            self.sorted = true;
        }
    }

    /// 有限值上的最近秩分位数（percentile ∈ [0, 100]）
    ///
    /// rank = ceil(p/100 · n)，至少为1，n 为有限值个数。
    pub fn percentile(&mut self, percentile: f64) -> f64 {
        if self.is_all_silent() {
            return f64::NEG_INFINITY;
        }
        self.ensure_sorted();

        let n = self.values.len();
        let p = percentile.clamp(0.0, 100.0);
        let rank = ((p / 100.0) * n as f64).ceil() as usize;
        let index = rank.clamp(1, n) - 1;
        self.values[index]
    }

    pub fn min(&mut self) -> f64 {
        self.percentile(0.0)
    }

    pub fn max(&mut self) -> f64 {
        self.percentile(100.0)
    }
}
