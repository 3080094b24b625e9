//! テスト・配線確認用の乱数重み

use std::path::Path;

use anyhow::{Context, Result};
use navmodel::runner::ReferenceWeights;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// 重みとバイアスの振れ幅
const WEIGHT_SCALE: f32 = 0.05;
const BIAS_SCALE: f32 = 0.5;

/// シードから乱数重みを作る
pub fn mock_weights(seed: u64) -> ReferenceWeights {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut weights = ReferenceWeights::zero();
    for b in weights.bias.iter_mut() {
        *b = rng.random_range(-BIAS_SCALE..BIAS_SCALE);
    }
    for w in weights.weight.iter_mut() {
        *w = rng.random_range(-WEIGHT_SCALE..WEIGHT_SCALE);
    }
    weights
}

/// 乱数重みを NAVW ファイルに書き出す
pub fn write_mock_weights(path: &Path, seed: u64) -> Result<()> {
    mock_weights(seed)
        .save(path)
        .with_context(|| format!("failed to write mock weights to {}", path.display()))?;
    log::info!("Wrote mock weights (seed={seed}) to {}", path.display());
    Ok(())
}
