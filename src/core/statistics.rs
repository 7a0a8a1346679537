//! 相关与回归统计
//!
//! 皮尔逊相关、最小二乘直线拟合、中位数。
//! 退化输入（零方差、点数不足）返回确定的值而不是 NaN。

/// 流式皮尔逊相关累积器（f64累积）
#[derive(Debug, Clone, Copy, Default)]
pub struct PearsonAccumulator {
    n: u64,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
}

impl PearsonAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, x: f64, y: f64) {
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;
    }

    /// 相关系数
    ///
    /// 两个序列都是常数时返回1.0（完全一致），只有一个是常数时返回0.0。
    pub fn correlation(&self) -> f64 {
        if self.n == 0 {
            return 1.0;
        }
        let n = self.n as f64;
        let var_x = (self.sum_xx - self.sum_x * self.sum_x / n).max(0.0);
        let var_y = (self.sum_yy - self.sum_y * self.sum_y / n).max(0.0);
        let cov = self.sum_xy - self.sum_x * self.sum_y / n;

        // 相对容差：常数序列的方差只剩舍入误差
        const REL_EPS: f64 = 1e-12;
        match (var_x <= REL_EPS * self.sum_xx, var_y <= REL_EPS * self.sum_yy) {
            (true, true) => 1.0,
            (true, false) | (false, true) => 0.0,
            (false, false) => (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0),
        }
    }
}

/// 两个等长序列的皮尔逊相关
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let mut acc = PearsonAccumulator::new();
    for (&a, &b) in x.iter().zip(y) {
        acc.add(a, b);
    }
    acc.correlation()
}

/// 最小二乘直线拟合结果 y = slope·x + intercept
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// 决定系数
    pub r_squared: f64,
    pub points: usize,
}

impl LinearFit {
    /// 拟合点集，少于2个点或 x 无变化时返回 None
    pub fn fit(points: &[(f64, f64)]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut syy = 0.0;
        for &(x, y) in points {
            let dx = x - mean_x;
            let dy = y - mean_y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        if sxx <= 0.0 {
            return None;
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        // y 无变化时拟合是精确的
        let r_squared = if syy <= 0.0 {
            1.0
        } else {
            ((sxy * sxy) / (sxx * syy)).clamp(0.0, 1.0)
        };

        Some(Self {
            slope,
            intercept,
            r_squared,
            points: points.len(),
        })
    }
}

/// 中位数（偶数个取中间两数均值），空序列返回 None
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        Some((sorted[mid - 1] + sorted[mid]) * 0.5)
    } else {
        Some(sorted[mid])
    }
}
