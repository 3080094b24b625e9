//! 3x3 行列ユーティリティ
//!
//! キャリブレーション定数と YUV 変換の合成に使う最小限の行列演算。
//! 要素は行優先（row-major）で `v[row * 3 + col]` に格納する。

/// 3 次元ベクトル
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub v: [f32; 3],
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { v: [x, y, z] }
    }
}

/// 3x3 行列（行優先）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub v: [f32; 9],
}

impl Mat3 {
    /// 単位行列
    pub const IDENTITY: Mat3 = Mat3::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub const fn new(v: [f32; 9]) -> Self {
        Self { v }
    }

    /// (row, col) の要素
    #[inline]
    pub const fn at(&self, row: usize, col: usize) -> f32 {
        self.v[row * 3 + col]
    }

    /// 行ごとの配列に変換
    pub fn rows(&self) -> [[f32; 3]; 3] {
        [
            [self.v[0], self.v[1], self.v[2]],
            [self.v[3], self.v[4], self.v[5]],
            [self.v[6], self.v[7], self.v[8]],
        ]
    }
}

/// 行列積 `a * b`
pub fn matmul3(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [0.0f32; 9];
    for row in 0..3 {
        for col in 0..3 {
            let mut acc = 0.0f32;
            for k in 0..3 {
                acc += a.at(row, k) * b.at(k, col);
            }
            out[row * 3 + col] = acc;
        }
    }
    Mat3::new(out)
}

/// 行列とベクトルの積 `a * b`
pub fn matvecmul3(a: &Mat3, b: &Vec3) -> Vec3 {
    let mut out = [0.0f32; 3];
    for (row, slot) in out.iter_mut().enumerate() {
        *slot = a.at(row, 0) * b.v[0] + a.at(row, 1) * b.v[1] + a.at(row, 2) * b.v[2];
    }
    Vec3 { v: out }
}

/// 画素中心を基準にスケール `s` を掛けた変換を合成する
///
/// `T_in(s) * m * T_out(s)` を返す。`T_out` は出力座標を 1/s 倍して
/// 画素中心 (+0.5) に寄せ、`T_in` はその逆を入力側で行う。
/// `s == 1.0` のとき結果は `m` と一致する。
pub fn transform_scale_buffer(m: &Mat3, s: f32) -> Mat3 {
    let transform_out = Mat3::new([1.0 / s, 0.0, 0.5, 0.0, 1.0 / s, 0.5, 0.0, 0.0, 1.0]);
    let transform_in = Mat3::new([s, 0.0, -0.5 * s, 0.0, s, -0.5 * s, 0.0, 0.0, 1.0]);
    matmul3(&transform_in, &matmul3(m, &transform_out))
}
