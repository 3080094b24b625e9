//! CPU リファレンスランナー
//!
//! アクセラレータのない環境向けの小さなネットワーク。
//!
//! 1. 256×256 の入力を 16×16 ブロックで平均プーリング（[0, 1] に正規化）
//! 2. 256 → 228 の全結合層（活性化なし）
//!
//! 学習済みの航法モデルではない。ライフサイクル・レイアウト・パブリッシュの
//! 経路を実機なしで動かすためのもの。

use std::path::Path;

use super::weights::ReferenceWeights;
use super::{ModelRunner, RunnerError};
use crate::layout::{NAV_INPUT_HEIGHT, NAV_INPUT_SIZE, NAV_INPUT_WIDTH, NAV_NET_OUTPUT_SIZE};

/// プーリングのブロック幅
pub const POOL_FACTOR: usize = 16;

/// プーリング後の幅（= 高さ）
pub const POOLED_WIDTH: usize = NAV_INPUT_WIDTH / POOL_FACTOR;

/// プーリング後の画素数
pub const POOLED_INPUT_SIZE: usize = POOLED_WIDTH * (NAV_INPUT_HEIGHT / POOL_FACTOR);

const _: () = assert!(NAV_INPUT_WIDTH % POOL_FACTOR == 0);
const _: () = assert!(NAV_INPUT_HEIGHT % POOL_FACTOR == 0);

const POOL_NORM: f32 = 1.0 / (POOL_FACTOR * POOL_FACTOR * 255) as f32;

/// CPU リファレンスランナー
pub struct ReferenceRunner {
    weights: ReferenceWeights,
    pooled: Box<[f32; POOLED_INPUT_SIZE]>,
    loaded: bool,
}

impl ReferenceRunner {
    /// 全重みゼロのランナー（出力は常に 0）
    pub fn zero() -> Self {
        Self::from_weights(ReferenceWeights::zero())
    }

    pub fn from_weights(weights: ReferenceWeights) -> Self {
        Self {
            weights,
            pooled: Box::new([0.0; POOLED_INPUT_SIZE]),
            loaded: false,
        }
    }

    /// NAVW ファイルから作成
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let path = path.as_ref();
        let weights = ReferenceWeights::from_file(path)?;
        log::info!("Loaded reference weights from {}", path.display());
        Ok(Self::from_weights(weights))
    }

    pub fn weights(&self) -> &ReferenceWeights {
        &self.weights
    }

    /// 平均プーリング
    fn pool(&mut self, input: &[u8]) {
        self.pooled.fill(0.0);
        for (row_idx, row) in input.chunks_exact(NAV_INPUT_WIDTH).enumerate() {
            let pooled_row = (row_idx / POOL_FACTOR) * POOLED_WIDTH;
            for (block_idx, block) in row.chunks_exact(POOL_FACTOR).enumerate() {
                let sum: u32 = block.iter().map(|&p| u32::from(p)).sum();
                self.pooled[pooled_row + block_idx] += sum as f32;
            }
        }
        for v in self.pooled.iter_mut() {
            *v *= POOL_NORM;
        }
    }
}

impl ModelRunner for ReferenceRunner {
    fn name(&self) -> &str {
        "reference"
    }

    fn load(&mut self, input_len: usize, output_len: usize) -> Result<(), RunnerError> {
        if input_len != NAV_INPUT_SIZE {
            return Err(RunnerError::DimensionMismatch {
                what: "input_len",
                expected: NAV_INPUT_SIZE,
                actual: input_len,
            });
        }
        if output_len != NAV_NET_OUTPUT_SIZE {
            return Err(RunnerError::DimensionMismatch {
                what: "output_len",
                expected: NAV_NET_OUTPUT_SIZE,
                actual: output_len,
            });
        }
        self.loaded = true;
        Ok(())
    }

    fn execute(&mut self, input: &[u8], output: &mut [f32]) -> Result<(), RunnerError> {
        if !self.loaded {
            return Err(RunnerError::NotLoaded);
        }
        if input.len() != NAV_INPUT_SIZE || output.len() != NAV_NET_OUTPUT_SIZE {
            return Err(RunnerError::Execution(format!(
                "buffer size changed after load: input={}, output={}",
                input.len(),
                output.len()
            )));
        }

        self.pool(input);

        let rows = self.weights.weight.chunks_exact(POOLED_INPUT_SIZE);
        for ((out, &bias), row) in output.iter_mut().zip(self.weights.bias.iter()).zip(rows) {
            let dot: f32 = row.iter().zip(self.pooled.iter()).map(|(w, x)| w * x).sum();
            *out = bias + dot;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(mut runner: ReferenceRunner) -> ReferenceRunner {
        runner.load(NAV_INPUT_SIZE, NAV_NET_OUTPUT_SIZE).unwrap();
        runner
    }

    #[test]
    fn test_pooled_dimensions() {
        assert_eq!(POOLED_WIDTH, 16);
        assert_eq!(POOLED_INPUT_SIZE, 256);
    }

    #[test]
    fn test_execute_before_load() {
        let mut runner = ReferenceRunner::zero();
        let input = vec![0u8; NAV_INPUT_SIZE];
        let mut output = vec![0.0f32; NAV_NET_OUTPUT_SIZE];
        assert!(matches!(runner.execute(&input, &mut output), Err(RunnerError::NotLoaded)));
    }

    #[test]
    fn test_load_rejects_wrong_dimensions() {
        let mut runner = ReferenceRunner::zero();
        assert!(matches!(
            runner.load(NAV_INPUT_SIZE - 1, NAV_NET_OUTPUT_SIZE),
            Err(RunnerError::DimensionMismatch { what: "input_len", .. })
        ));
        assert!(matches!(
            runner.load(NAV_INPUT_SIZE, NAV_NET_OUTPUT_SIZE + 1),
            Err(RunnerError::DimensionMismatch { what: "output_len", .. })
        ));
    }

    #[test]
    fn test_zero_network() {
        let mut runner = loaded(ReferenceRunner::zero());
        let input = vec![200u8; NAV_INPUT_SIZE];
        let mut output = vec![9.0f32; NAV_NET_OUTPUT_SIZE];
        runner.execute(&input, &mut output).unwrap();
        assert!(output.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_bias_only() {
        let mut weights = ReferenceWeights::zero();
        for (i, b) in weights.bias.iter_mut().enumerate() {
            *b = i as f32;
        }
        let mut runner = loaded(ReferenceRunner::from_weights(weights));
        let input = vec![17u8; NAV_INPUT_SIZE];
        let mut output = vec![0.0f32; NAV_NET_OUTPUT_SIZE];
        runner.execute(&input, &mut output).unwrap();
        for (i, v) in output.iter().enumerate() {
            assert_eq!(*v, i as f32);
        }
    }

    #[test]
    fn test_single_weight_reads_pooled_mean() {
        // 出力 3 が左上ブロックの平均を、出力 4 が右下ブロックの平均を読む
        let mut weights = ReferenceWeights::zero();
        weights.weight[3 * POOLED_INPUT_SIZE] = 1.0;
        weights.weight[4 * POOLED_INPUT_SIZE + POOLED_INPUT_SIZE - 1] = 2.0;
        let mut runner = loaded(ReferenceRunner::from_weights(weights));

        let mut input = vec![0u8; NAV_INPUT_SIZE];
        for y in 0..POOL_FACTOR {
            for x in 0..POOL_FACTOR {
                input[y * NAV_INPUT_WIDTH + x] = 255;
            }
        }
        for y in NAV_INPUT_HEIGHT - POOL_FACTOR..NAV_INPUT_HEIGHT {
            for x in NAV_INPUT_WIDTH - POOL_FACTOR..NAV_INPUT_WIDTH {
                input[y * NAV_INPUT_WIDTH + x] = 51;
            }
        }

        let mut output = vec![0.0f32; NAV_NET_OUTPUT_SIZE];
        runner.execute(&input, &mut output).unwrap();
        assert!((output[3] - 1.0).abs() < 1e-6);
        assert!((output[4] - 0.4).abs() < 1e-6);
        assert_eq!(output[0], 0.0);
    }
}
