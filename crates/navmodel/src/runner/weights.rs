//! NAVW ファイル I/O
//!
//! CPU リファレンスランナーの重みファイル形式。すべてリトルエンディアン。
//!
//! ```text
//! header (16 bytes): magic "NAVW" | version u32 | input_dim u32 | output_dim u32
//! bias   : f32[output_dim]
//! weight : f32[output_dim][input_dim]（row-major）
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::RunnerError;
use super::reference::POOLED_INPUT_SIZE;
use crate::layout::NAV_NET_OUTPUT_SIZE;

/// NAVW ファイルマジックナンバー
pub const NAVW_MAGIC: [u8; 4] = *b"NAVW";

/// NAVW ファイルバージョン
pub const NAVW_VERSION: u32 = 1;

/// NAVW ヘッダ（16 bytes）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavwHeader {
    pub version: u32,
    /// 入力次元（プーリング後の画素数）
    pub input_dim: u32,
    /// 出力次元（ネットワーク出力 float 数）
    pub output_dim: u32,
}

impl NavwHeader {
    /// ヘッダーサイズ（bytes）
    pub const SIZE: usize = 16;

    /// リファレンスランナー用の既定ヘッダ
    pub const fn reference() -> Self {
        Self {
            version: NAVW_VERSION,
            input_dim: POOLED_INPUT_SIZE as u32,
            output_dim: NAV_NET_OUTPUT_SIZE as u32,
        }
    }

    /// バイト列から読み込み
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Result<Self, RunnerError> {
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != NAVW_MAGIC {
            return Err(RunnerError::InvalidMagic(magic));
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != NAVW_VERSION {
            return Err(RunnerError::UnsupportedVersion {
                found: version,
                expected: NAVW_VERSION,
            });
        }

        let input_dim = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let output_dim = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        // 次元の検証
        if input_dim as usize != POOLED_INPUT_SIZE {
            return Err(RunnerError::DimensionMismatch {
                what: "input_dim",
                expected: POOLED_INPUT_SIZE,
                actual: input_dim as usize,
            });
        }
        if output_dim as usize != NAV_NET_OUTPUT_SIZE {
            return Err(RunnerError::DimensionMismatch {
                what: "output_dim",
                expected: NAV_NET_OUTPUT_SIZE,
                actual: output_dim as usize,
            });
        }

        Ok(Self {
            version,
            input_dim,
            output_dim,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&NAVW_MAGIC);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.input_dim.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.output_dim.to_le_bytes());
        bytes
    }
}

/// リファレンスランナーの重み
#[derive(Clone)]
pub struct ReferenceWeights {
    /// バイアス: f32[NAV_NET_OUTPUT_SIZE]
    pub bias: Box<[f32; NAV_NET_OUTPUT_SIZE]>,

    /// 重み: f32[NAV_NET_OUTPUT_SIZE][POOLED_INPUT_SIZE]（row-major）
    ///
    /// weight[output_idx * POOLED_INPUT_SIZE + input_idx]
    pub weight: Box<[f32]>,
}

impl ReferenceWeights {
    /// 新規作成（ゼロ初期化）
    pub fn zero() -> Self {
        Self {
            bias: Box::new([0.0; NAV_NET_OUTPUT_SIZE]),
            weight: vec![0.0; NAV_NET_OUTPUT_SIZE * POOLED_INPUT_SIZE].into_boxed_slice(),
        }
    }

    /// ファイルから読み込み
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let mut reader = BufReader::new(File::open(path)?);
        read_navw(&mut reader)
    }

    /// NAVW 形式で書き出し
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&NavwHeader::reference().to_bytes())?;
        for v in self.bias.iter() {
            writer.write_all(&v.to_le_bytes())?;
        }
        for v in self.weight.iter() {
            writer.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    /// ファイルに書き出し
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()
    }
}

impl std::fmt::Debug for ReferenceWeights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceWeights")
            .field("bias_len", &self.bias.len())
            .field("weight_len", &self.weight.len())
            .finish()
    }
}

/// NAVW ストリームを読み込み
///
/// 重みの後ろに余分なバイトがあればエラーにする。
pub fn read_navw<R: Read>(reader: &mut R) -> Result<ReferenceWeights, RunnerError> {
    let mut header_bytes = [0u8; NavwHeader::SIZE];
    read_section(reader, &mut header_bytes, "header")?;
    let header = NavwHeader::from_bytes(&header_bytes)?;
    log::debug!(
        "NAVW header: version={}, input_dim={}, output_dim={}",
        header.version,
        header.input_dim,
        header.output_dim
    );

    let mut weights = ReferenceWeights::zero();

    // bias: f32[output_dim]（先に読み込み）
    let mut buf = vec![0u8; NAV_NET_OUTPUT_SIZE * 4];
    read_section(reader, &mut buf, "bias")?;
    for (dst, chunk) in weights.bias.iter_mut().zip(buf.chunks_exact(4)) {
        *dst = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    // weight: f32[output_dim][input_dim]
    let mut buf = vec![0u8; NAV_NET_OUTPUT_SIZE * POOLED_INPUT_SIZE * 4];
    read_section(reader, &mut buf, "weight")?;
    for (dst, chunk) in weights.weight.iter_mut().zip(buf.chunks_exact(4)) {
        *dst = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    let trailing = io::copy(reader, &mut io::sink())?;
    if trailing != 0 {
        return Err(RunnerError::TrailingData(trailing));
    }

    Ok(weights)
}

fn read_section<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    section: &'static str,
) -> Result<(), RunnerError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            RunnerError::Truncated(section)
        } else {
            RunnerError::Io(e)
        }
    })
}
