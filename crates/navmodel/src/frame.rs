//! フレーム前処理
//!
//! カメラフレームをモデル入力バッファ（256×256、1 チャンネル）に書き込む境界。

use crate::error::{NavModelError, Result};
use crate::layout::{NAV_INPUT_HEIGHT, NAV_INPUT_SIZE, NAV_INPUT_WIDTH};

/// モデル入力に変換できるフレーム
pub trait ModelInput {
    /// `dst` の全要素を書き込む
    fn write_input(&self, dst: &mut [u8; NAV_INPUT_SIZE]) -> Result<()>;
}

/// 描画済みのモデル入力（そのままコピーする）
#[derive(Debug, Clone, Copy)]
pub struct VisionBuf<'a> {
    pub data: &'a [u8],
}

impl<'a> VisionBuf<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl ModelInput for VisionBuf<'_> {
    fn write_input(&self, dst: &mut [u8; NAV_INPUT_SIZE]) -> Result<()> {
        if self.data.len() != NAV_INPUT_SIZE {
            return Err(NavModelError::Configuration(format!(
                "vision buffer has {} bytes, expected {NAV_INPUT_SIZE}",
                self.data.len()
            )));
        }
        dst.copy_from_slice(self.data);
        Ok(())
    }
}

/// 任意サイズの輝度プレーン
///
/// 各出力画素に対応する入力矩形の平均（四捨五入）で 256×256 にリサンプルする。
#[derive(Debug, Clone, Copy)]
pub struct LumaFrame<'a> {
    pub width: usize,
    pub height: usize,
    /// 行あたりのバイト数
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> LumaFrame<'a> {
    /// 行間に余白のないフレーム
    pub fn packed(width: usize, height: usize, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            stride: width,
            data,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(NavModelError::Configuration(format!(
                "luma frame has empty geometry {}x{}",
                self.width, self.height
            )));
        }
        if self.stride < self.width {
            return Err(NavModelError::Configuration(format!(
                "luma stride {} is smaller than width {}",
                self.stride, self.width
            )));
        }
        // 最終行は stride 分なくてもよい
        let required = self
            .stride
            .checked_mul(self.height - 1)
            .and_then(|n| n.checked_add(self.width))
            .ok_or_else(|| {
                NavModelError::Configuration(format!(
                    "luma frame geometry {}x{} (stride {}) overflows",
                    self.width, self.height, self.stride
                ))
            })?;
        if self.data.len() < required {
            return Err(NavModelError::Configuration(format!(
                "luma frame has {} bytes, expected at least {required}",
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// 出力座標 `d` に対応する入力区間 [start, end)
#[inline]
fn source_span(d: usize, src_len: usize, dst_len: usize) -> (usize, usize) {
    let start = d * src_len / dst_len;
    let end = ((d + 1) * src_len).div_ceil(dst_len);
    (start, end)
}

impl ModelInput for LumaFrame<'_> {
    fn write_input(&self, dst: &mut [u8; NAV_INPUT_SIZE]) -> Result<()> {
        self.validate()?;

        for (dy, dst_row) in dst.chunks_exact_mut(NAV_INPUT_WIDTH).enumerate() {
            let (y0, y1) = source_span(dy, self.height, NAV_INPUT_HEIGHT);
            for (dx, out) in dst_row.iter_mut().enumerate() {
                let (x0, x1) = source_span(dx, self.width, NAV_INPUT_WIDTH);
                let mut sum = 0u64;
                for y in y0..y1 {
                    let row = &self.data[y * self.stride..];
                    sum += row[x0..x1].iter().map(|&p| u64::from(p)).sum::<u64>();
                }
                let count = ((y1 - y0) * (x1 - x0)) as u64;
                *out = ((sum + count / 2) / count) as u8;
            }
        }
        Ok(())
    }
}
