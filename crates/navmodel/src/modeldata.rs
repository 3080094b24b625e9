//! モデル共通定数
//!
//! 軌跡のサンプリンググリッド、カメラ内部パラメータ、YUV 変換、
//! 顔キーポイントの基準形状など、モデル出力を解釈する側が共有する定数群。
//! すべてコンパイル時に確定し、プロセス全体で読み取り専用として共有される。

use crate::error::{NavModelError, Result};
use crate::mat::{Mat3, Vec3, transform_scale_buffer};

// =============================================================================
// 軌跡
// =============================================================================

/// 軌跡の点数
pub const TRAJECTORY_SIZE: usize = 33;

/// 横方向 MPC のホライズン長
pub const LAT_MPC_N: usize = 16;

/// 縦方向 MPC のホライズン長
pub const LON_MPC_N: usize = 32;

/// 描画する軌跡の最小距離 [m]
pub const MIN_DRAW_DISTANCE: f32 = 10.0;

/// 描画する軌跡の最大距離 [m]
pub const MAX_DRAW_DISTANCE: f32 = 100.0;

/// 時間グリッドの最大値 [s]
pub const T_IDXS_MAX: f64 = 10.0;

/// 距離グリッドの最大値 [m]
pub const X_IDXS_MAX: f64 = 192.0;

/// 二次イージングのサンプリンググリッドを生成する
///
/// `result[i] = max_val * (i / (N - 1))^2`。計算はすべて f64 で行う。
/// `N < 2` は 0 除算になるため定数評価時にコンパイルエラーとなる。
pub const fn build_idxs<const N: usize>(max_val: f64) -> [f64; N] {
    assert!(N >= 2, "index grid needs at least two samples");
    let mut result = [0.0f64; N];
    let mut i = 0;
    while i < N {
        let t = i as f64 / (N - 1) as f64;
        result[i] = max_val * (t * t);
        i += 1;
    }
    result
}

/// f64 グリッドを f32 に丸める
///
/// f32 版は独立に計算せず、必ず f64 版の丸めとして得る。
pub const fn narrow_idxs<const N: usize>(src: &[f64; N]) -> [f32; N] {
    let mut result = [0.0f32; N];
    let mut i = 0;
    while i < N {
        result[i] = src[i] as f32;
        i += 1;
    }
    result
}

/// 時間グリッド（0〜10 秒）
pub const T_IDXS: [f64; TRAJECTORY_SIZE] = build_idxs(T_IDXS_MAX);
pub const T_IDXS_FLOAT: [f32; TRAJECTORY_SIZE] = narrow_idxs(&T_IDXS);

/// 距離グリッド（0〜192 m）
pub const X_IDXS: [f64; TRAJECTORY_SIZE] = build_idxs(X_IDXS_MAX);
pub const X_IDXS_FLOAT: [f32; TRAJECTORY_SIZE] = narrow_idxs(&X_IDXS);

/// グリッド要素として使えるスカラー型
pub trait IndexScalar: Copy {
    fn from_f64(value: f64) -> Self;
}

impl IndexScalar for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

impl IndexScalar for f32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// 任意長のグリッドを実行時に生成する
///
/// `count == TRAJECTORY_SIZE` のとき定数テーブルとビット単位で一致する。
pub fn build_indices<T: IndexScalar>(max_value: f64, count: usize) -> Result<Vec<T>> {
    if count < 2 {
        return Err(NavModelError::Configuration(format!(
            "index grid needs at least two samples, got {count}"
        )));
    }
    let denom = (count - 1) as f64;
    Ok((0..count)
        .map(|i| {
            let t = i as f64 / denom;
            T::from_f64(max_value * (t * t))
        })
        .collect())
}

// =============================================================================
// カメラキャリブレーション
// =============================================================================

/// 道路カメラ（fcam）の内部パラメータ
pub const FCAM_INTRINSIC_MATRIX: Mat3 = Mat3::new([
    2648.0,
    0.0,
    1928.0 / 2.0,
    0.0,
    2648.0,
    1208.0 / 2.0,
    0.0,
    0.0,
    1.0,
]);

/// 広角カメラ（ecam）の内部パラメータ
///
/// 焦点距離は恐らく正しくない（倍率がフレーム内で一定でない）。
/// モデルを再学習するまで変更しないこと。
pub const ECAM_INTRINSIC_MATRIX: Mat3 = Mat3::new([
    567.0,
    0.0,
    1928.0 / 2.0,
    0.0,
    567.0,
    1208.0 / 2.0,
    0.0,
    0.0,
    1.0,
]);

/// モデル入力用の YUV 変換
///
/// 現状は単位行列をスケール 1.0 で合成した no-op。再キャリブレーション待ちの
/// プレースホルダなので、スケール合成の手順ごと残している。
pub fn model_yuv_transform() -> Mat3 {
    let db_s = 1.0f32;
    let transform = Mat3::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    transform_scale_buffer(&transform, db_s)
}

// =============================================================================
// 顔キーポイント
// =============================================================================

/// 顔キーポイント数
pub const FACE_KPTS_SIZE: usize = 14;

/// 顔キーポイントの 3D 基準位置
pub const DEFAULT_FACE_KPTS_3D: [Vec3; FACE_KPTS_SIZE] = [
    Vec3::new(-33.00, -28.50, 38.30),
    Vec3::new(-33.00, -39.50, 38.30),
    Vec3::new(33.00, -28.50, 38.30),
    Vec3::new(33.00, -39.50, 38.30),
    Vec3::new(-27.50, 36.40, 45.45),
    Vec3::new(-19.80, 41.90, 51.50),
    Vec3::new(-11.00, 46.30, 58.10),
    Vec3::new(0.00, 47.95, 60.30),
    Vec3::new(11.00, 46.30, 58.10),
    Vec3::new(19.80, 41.90, 51.50),
    Vec3::new(27.50, 36.40, 45.45),
    Vec3::new(0.00, -23.00, 46.55),
    Vec3::new(-8.80, 10.00, 68.55),
    Vec3::new(0.00, 10.00, 50.40),
];

/// 各パーツ（左目・右目・輪郭・鼻）の末尾インデックス
pub const FACE_END_IDXS: [usize; 4] = [1, 3, 10, FACE_KPTS_SIZE - 1];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_formula() {
        for i in 0..TRAJECTORY_SIZE {
            let t = i as f64 / 32.0;
            assert_eq!(T_IDXS[i], 10.0 * (t * t));
            assert_eq!(X_IDXS[i], 192.0 * (t * t));
        }
    }

    #[test]
    fn test_grid_endpoints() {
        assert_eq!(T_IDXS[0], 0.0);
        assert_eq!(X_IDXS[0], 0.0);
        assert_eq!(T_IDXS[TRAJECTORY_SIZE - 1], T_IDXS_MAX);
        assert_eq!(X_IDXS[TRAJECTORY_SIZE - 1], X_IDXS_MAX);
        assert_eq!(T_IDXS_FLOAT[TRAJECTORY_SIZE - 1], 10.0f32);
        assert_eq!(X_IDXS_FLOAT[TRAJECTORY_SIZE - 1], 192.0f32);
    }

    #[test]
    fn test_grid_monotonic() {
        for w in T_IDXS.windows(2) {
            assert!(w[0] <= w[1]);
        }
        for w in X_IDXS_FLOAT.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn test_float_grid_is_narrowed_double_grid() {
        for i in 0..TRAJECTORY_SIZE {
            assert_eq!(T_IDXS_FLOAT[i].to_bits(), (T_IDXS[i] as f32).to_bits());
            assert_eq!(X_IDXS_FLOAT[i].to_bits(), (X_IDXS[i] as f32).to_bits());
        }
    }

    #[test]
    fn test_runtime_grid_matches_const() {
        let t: Vec<f64> = build_indices(T_IDXS_MAX, TRAJECTORY_SIZE).unwrap();
        let x: Vec<f32> = build_indices(X_IDXS_MAX, TRAJECTORY_SIZE).unwrap();
        assert_eq!(t.as_slice(), &T_IDXS[..]);
        assert_eq!(x.as_slice(), &X_IDXS_FLOAT[..]);
    }

    #[test]
    fn test_runtime_grid_rejects_single_sample() {
        let err = build_indices::<f64>(10.0, 1).unwrap_err();
        assert!(matches!(err, NavModelError::Configuration(_)));
        assert!(build_indices::<f32>(10.0, 0).is_err());
    }

    #[test]
    fn test_intrinsics() {
        assert_eq!(
            FCAM_INTRINSIC_MATRIX.rows(),
            [[2648.0, 0.0, 964.0], [0.0, 2648.0, 604.0], [0.0, 0.0, 1.0]]
        );
        assert_eq!(
            ECAM_INTRINSIC_MATRIX.rows(),
            [[567.0, 0.0, 964.0], [0.0, 567.0, 604.0], [0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_model_yuv_transform_is_identity() {
        assert_eq!(model_yuv_transform(), Mat3::IDENTITY);
    }

    #[test]
    fn test_face_keypoints() {
        assert_eq!(DEFAULT_FACE_KPTS_3D.len(), FACE_KPTS_SIZE);
        assert_eq!(DEFAULT_FACE_KPTS_3D[0], Vec3::new(-33.0, -28.5, 38.3));
        assert_eq!(DEFAULT_FACE_KPTS_3D[7], Vec3::new(0.0, 47.95, 60.3));
        assert_eq!(DEFAULT_FACE_KPTS_3D[13], Vec3::new(0.0, 10.0, 50.4));
        assert_eq!(FACE_END_IDXS, [1, 3, 10, 13]);
    }
}
