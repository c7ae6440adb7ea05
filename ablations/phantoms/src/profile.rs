//! 算法运行统计.

use std::time::{Duration, Instant};

use bone_berry::prelude::*;

/// ablation/benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以微秒为单位).
    #[inline]
    fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 单个体模的运行记录.
#[derive(Clone, Debug)]
pub struct Record {
    /// 体模.
    pub phantom: Phantom,

    /// 名义厚度 (mm).
    pub nominal: f64,

    /// 统计结果.
    pub outcome: ThicknessResult<ThicknessStats>,

    /// 耗时.
    pub time: Duration,
}

impl Record {
    /// 平均厚度相对名义厚度的误差. 计算失败时返回 `None`.
    pub fn relative_error(&self) -> Option<f64> {
        let stats = self.outcome.as_ref().ok()?;
        Some((stats.mean - self.nominal) / self.nominal)
    }
}

/// ablation/benchmark 数据统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 按处理顺序排列的记录.
    records: Vec<Record>,

    /// 处理体模花费的总时间.
    target_time: AccTimer,

    /// 整个任务花费的总时间.
    real_time: AccTimer,
}

impl Profile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            target_time: AccTimer::new(),
            real_time: AccTimer::new(),
        }
    }

    /// 开始一次新的体模处理计时.
    #[inline]
    pub fn target_start(&mut self) {
        self.target_time.start();
    }

    /// 结束一次体模处理计时, 并记录结果.
    pub fn record(
        &mut self,
        phantom: Phantom,
        nominal: f64,
        outcome: ThicknessResult<ThicknessStats>,
    ) {
        let time = self.target_time.elapsed();
        if let Err(e) = &outcome {
            log::warn!("{phantom}: {e}");
        }
        self.records.push(Record {
            phantom,
            nominal,
            outcome,
            time,
        });
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 获得所有记录.
    #[inline]
    pub fn get_records(&self) -> &[Record] {
        &self.records
    }

    /// 以微秒为单位获得处理体模的总花费自然时间.
    #[inline]
    pub fn get_target_time_us(&self) -> u64 {
        self.target_time.get_total_us()
    }

    /// 以微秒为单位获得算法运行到目前的总自然时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 平均相对误差的绝对值. 没有成功记录时返回 `None`.
    pub fn get_avg_abs_error(&self) -> Option<f64> {
        let errs: Vec<f64> = self
            .records
            .iter()
            .filter_map(Record::relative_error)
            .map(f64::abs)
            .collect();
        match errs.len() {
            0 => None,
            n => Some(errs.iter().sum::<f64>() / n as f64),
        }
    }

    /// 获取最耗时的一次任务所消耗的时间. 如果不存在任务, 则返回 `None`.
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.records.iter().map(|r| r.time).max()
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}
