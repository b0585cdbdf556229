//! 可复现随机源
//!
//! 基于 ChaCha20，相同种子产生相同序列。进度计算与人格文案共用同一个注入的随机源，
//! 测试中固定种子即可得到确定结果。

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

/// 引擎随机源
#[derive(Debug, Clone)]
pub struct EngineRng {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl EngineRng {
    /// 使用指定种子创建
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }

    /// 未指定种子时随机生成，并记录到日志
    pub fn from_seed_or_random(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        tracing::info!(seed = seed, "persona rng seeded (set rng_seed={} to replay)", seed);
        Self::new(seed)
    }

    /// 以给定概率返回 true
    pub fn chance(&self, probability: f64) -> bool {
        let p = probability.clamp(0.0, 1.0);
        self.rng.lock().gen_bool(p)
    }

    /// 闭区间 [min, max] 内的均匀整数
    pub fn range_inclusive(&self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        self.rng.lock().gen_range(min..=max)
    }

    /// 均匀选取一个元素
    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.rng.lock().gen_range(0..items.len());
        items.get(idx)
    }
}

impl Default for EngineRng {
    fn default() -> Self {
        Self::from_seed_or_random(None)
    }
}
