//! ナビゲーションモデル出力のフラットレイアウト
//!
//! ネットワークは構造を知らず、`NAV_NET_OUTPUT_SIZE` 個の f32 を順に書き込むだけ。
//! ここで定義する構造体はその float 配列の「再解釈」であり、コピーでも並べ替えでもない。
//!
//! ```text
//! offset   0 .. 66   plan.mean   [XY; 33]
//! offset  66 .. 132  plan.std    [XY; 33]
//! offset 132 .. 164  desire_pred [f32; 32]
//! offset 164 .. 228  features    [f32; 64]
//! offset 228         dsp_execution_time（ランナーではなくライフサイクルが書く）
//! ```
//!
//! パディングが入る構造体は `bytemuck::Pod` の derive がコンパイルエラーにする。
//! 加えて下の `const` アサーションでサイズ・オフセット・アラインメントを固定する。

use bytemuck::{Pod, Zeroable};
use std::mem::{align_of, offset_of, size_of};

use crate::desire::{Desire, NAV_DESIRE_LEN};
use crate::error::{NavModelError, Result};
use crate::modeldata::TRAJECTORY_SIZE;

// =============================================================================
// 次元定義
// =============================================================================

/// 入力画像の幅
pub const NAV_INPUT_WIDTH: usize = 256;

/// 入力画像の高さ
pub const NAV_INPUT_HEIGHT: usize = 256;

/// 入力バッファのバイト数（1 チャンネル）
pub const NAV_INPUT_SIZE: usize = NAV_INPUT_WIDTH * NAV_INPUT_HEIGHT;

/// 特徴量埋め込みの次元数
pub const NAV_FEATURE_LEN: usize = 64;

/// 出力バッファの float 数（末尾の実行時間スロットを含む）
pub const NAV_OUTPUT_SIZE: usize = size_of::<NavModelResult>() / size_of::<f32>();

/// ネットワークが書き込む float 数
pub const NAV_NET_OUTPUT_SIZE: usize = NAV_OUTPUT_SIZE - 1;

/// 実行時間スロットの位置
pub const DSP_EXECUTION_TIME_INDEX: usize = NAV_NET_OUTPUT_SIZE;

// =============================================================================
// 出力構造体
// =============================================================================

/// 2 次元の点
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct NavModelOutputXY {
    pub x: f32,
    pub y: f32,
}

/// 軌跡（平均と広がり）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct NavModelOutputPlan {
    pub mean: [NavModelOutputXY; TRAJECTORY_SIZE],
    /// 不確かさの広がり（バイアスではない）
    pub std: [NavModelOutputXY; TRAJECTORY_SIZE],
}

/// desire クラスごとの生スコア（正規化されていない）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct NavModelOutputDesirePrediction {
    pub values: [f32; NAV_DESIRE_LEN],
}

/// 特徴量埋め込み
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct NavModelOutputFeatures {
    pub values: [f32; NAV_FEATURE_LEN],
}

/// 1 フレーム分の評価結果
///
/// `[f32; NAV_OUTPUT_SIZE]` とレイアウトが完全に一致する。
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct NavModelResult {
    pub plan: NavModelOutputPlan,
    pub desire_pred: NavModelOutputDesirePrediction,
    pub features: NavModelOutputFeatures,
    /// ランナー実行時間 [s]
    pub dsp_execution_time: f32,
}

const _: () = assert!(size_of::<NavModelOutputXY>() == size_of::<f32>() * 2);
const _: () = assert!(
    size_of::<NavModelOutputPlan>() == size_of::<NavModelOutputXY>() * TRAJECTORY_SIZE * 2
);
const _: () =
    assert!(size_of::<NavModelOutputDesirePrediction>() == size_of::<f32>() * NAV_DESIRE_LEN);
const _: () = assert!(size_of::<NavModelOutputFeatures>() == size_of::<f32>() * NAV_FEATURE_LEN);
const _: () = assert!(
    size_of::<NavModelResult>()
        == size_of::<NavModelOutputPlan>()
            + size_of::<NavModelOutputDesirePrediction>()
            + size_of::<NavModelOutputFeatures>()
            + size_of::<f32>()
);
const _: () = assert!(size_of::<NavModelResult>() % size_of::<f32>() == 0);
const _: () = assert!(align_of::<NavModelResult>() == align_of::<f32>());
const _: () = assert!(offset_of!(NavModelResult, plan) == 0);
const _: () = assert!(
    offset_of!(NavModelResult, desire_pred) == size_of::<NavModelOutputPlan>()
);
const _: () = assert!(
    offset_of!(NavModelResult, features)
        == size_of::<NavModelOutputPlan>() + size_of::<NavModelOutputDesirePrediction>()
);
const _: () = assert!(
    offset_of!(NavModelResult, dsp_execution_time)
        == DSP_EXECUTION_TIME_INDEX * size_of::<f32>()
);

impl NavModelOutputPlan {
    /// i 番目の点の (平均, 広がり)
    pub fn point(&self, i: usize) -> Option<(NavModelOutputXY, NavModelOutputXY)> {
        Some((*self.mean.get(i)?, *self.std.get(i)?))
    }
}

impl NavModelOutputDesirePrediction {
    /// 指定クラスのスコア
    #[inline]
    pub fn weight(&self, desire: Desire) -> f32 {
        self.values[desire.index()]
    }

    /// 名前付きクラスのうち最大スコアのもの（予約スロットは無視）
    pub fn argmax(&self) -> Option<Desire> {
        Desire::ALL
            .iter()
            .copied()
            .filter(|d| !self.weight(*d).is_nan())
            .max_by(|a, b| self.weight(*a).total_cmp(&self.weight(*b)))
    }
}

impl NavModelResult {
    /// フラットバッファを結果として再解釈する（コピーなし）
    #[inline]
    pub fn from_flat(flat: &[f32; NAV_OUTPUT_SIZE]) -> &NavModelResult {
        bytemuck::must_cast_ref(flat)
    }

    /// 結果をフラットバッファとして見る（コピーなし）
    #[inline]
    pub fn as_flat(&self) -> &[f32; NAV_OUTPUT_SIZE] {
        bytemuck::must_cast_ref(self)
    }

    /// 長さ未確定のスライスを再解釈する
    pub fn try_from_slice(flat: &[f32]) -> Result<&NavModelResult> {
        let flat: &[f32; NAV_OUTPUT_SIZE] = flat.try_into().map_err(|_| {
            NavModelError::Configuration(format!(
                "output buffer has {} floats, expected {NAV_OUTPUT_SIZE}",
                flat.len()
            ))
        })?;
        Ok(Self::from_flat(flat))
    }

    /// ネットワーク出力部分（実行時間スロットを除く）
    #[inline]
    pub fn net_output(&self) -> &[f32] {
        &self.as_flat()[..NAV_NET_OUTPUT_SIZE]
    }
}
