//! フレームの入力元

use std::fs::File;
use std::io::{self, BufReader, Read};

use anyhow::{Context, Result, bail};
use navmodel::frame::LumaFrame;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::{InputConfig, SourceKind};

/// 1 フレーム分の輝度プレーン
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_id: u32,
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn luma(&self) -> LumaFrame<'_> {
        LumaFrame::packed(self.width, self.height, &self.data)
    }
}

/// フレーム列
pub trait FrameSource {
    /// 次のフレーム。入力が尽きたら `None`
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// 1 フレームのバイト数
fn frame_len(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .with_context(|| format!("frame geometry {width}x{height} overflows"))
}

/// 固定サイズの輝度プレーンを連結したストリーム
pub struct RawFileSource<R: Read> {
    reader: R,
    width: usize,
    height: usize,
    next_id: u32,
}

impl<R: Read> RawFileSource<R> {
    pub fn new(reader: R, width: usize, height: usize) -> Self {
        Self {
            reader,
            width,
            height,
            next_id: 0,
        }
    }
}

impl<R: Read> FrameSource for RawFileSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut data = vec![0u8; frame_len(self.width, self.height)?];
        let mut filled = 0;
        while filled < data.len() {
            match self.reader.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("failed to read raw frame"),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < data.len() {
            bail!(
                "truncated raw frame {}: got {filled} of {} bytes",
                self.next_id,
                data.len()
            );
        }

        let frame = Frame {
            frame_id: self.next_id,
            width: self.width,
            height: self.height,
            data,
        };
        self.next_id = self.next_id.wrapping_add(1);
        Ok(Some(frame))
    }
}

/// 乱数フレーム（シード固定で再現可能）
pub struct SyntheticSource {
    rng: Xoshiro256PlusPlus,
    width: usize,
    height: usize,
    /// 0 = 無制限
    frames: u64,
    emitted: u64,
    next_id: u32,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize, frames: u64, seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            width,
            height,
            frames,
            emitted: 0,
            next_id: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frames != 0 && self.emitted >= self.frames {
            return Ok(None);
        }
        let mut data = vec![0u8; frame_len(self.width, self.height)?];
        self.rng.fill_bytes(&mut data);
        let frame = Frame {
            frame_id: self.next_id,
            width: self.width,
            height: self.height,
            data,
        };
        self.emitted += 1;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(Some(frame))
    }
}

/// 設定から入力元を作る
pub fn open_source(cfg: &InputConfig) -> Result<Box<dyn FrameSource>> {
    match cfg.source {
        SourceKind::Synthetic => {
            log::info!(
                "Using synthetic frames: {}x{}, frames={}, seed={}",
                cfg.width,
                cfg.height,
                cfg.frames,
                cfg.seed
            );
            Ok(Box::new(SyntheticSource::new(cfg.width, cfg.height, cfg.frames, cfg.seed)))
        }
        SourceKind::Raw if cfg.path == "-" => {
            log::info!("Reading raw {}x{} frames from stdin", cfg.width, cfg.height);
            Ok(Box::new(RawFileSource::new(io::stdin().lock(), cfg.width, cfg.height)))
        }
        SourceKind::Raw => {
            let file = File::open(&cfg.path)
                .with_context(|| format!("failed to open input {}", cfg.path))?;
            log::info!("Reading raw {}x{} frames from {}", cfg.width, cfg.height, cfg.path);
            Ok(Box::new(RawFileSource::new(BufReader::new(file), cfg.width, cfg.height)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_raw_source_splits_frames() {
        let data: Vec<u8> = (0..24).collect();
        let mut src = RawFileSource::new(Cursor::new(data), 4, 3);

        let f0 = src.next_frame().unwrap().unwrap();
        assert_eq!(f0.frame_id, 0);
        assert_eq!(f0.data, (0..12).collect::<Vec<u8>>());
        let f1 = src.next_frame().unwrap().unwrap();
        assert_eq!(f1.frame_id, 1);
        assert_eq!(f1.data[0], 12);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_raw_source_truncated() {
        let mut src = RawFileSource::new(Cursor::new(vec![0u8; 10]), 4, 3);
        let err = src.next_frame().unwrap_err();
        assert!(err.to_string().contains("truncated raw frame 0"));
    }

    #[test]
    fn test_synthetic_source_is_reproducible() {
        let mut a = SyntheticSource::new(8, 8, 3, 42);
        let mut b = SyntheticSource::new(8, 8, 3, 42);
        for id in 0..3 {
            let fa = a.next_frame().unwrap().unwrap();
            let fb = b.next_frame().unwrap().unwrap();
            assert_eq!(fa.frame_id, id);
            assert_eq!(fa.data, fb.data);
        }
        assert!(a.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_synthetic_frame_id_wraps() {
        let mut src = SyntheticSource::new(2, 2, 0, 1);
        src.next_id = u32::MAX;
        assert_eq!(src.next_frame().unwrap().unwrap().frame_id, u32::MAX);
        assert_eq!(src.next_frame().unwrap().unwrap().frame_id, 0);
    }

    #[test]
    fn test_overflowing_geometry_is_an_error() {
        let mut raw = RawFileSource::new(Cursor::new(vec![0u8; 4]), usize::MAX, 2);
        let err = raw.next_frame().unwrap_err();
        assert!(err.to_string().contains("overflows"), "{err}");

        let mut synthetic = SyntheticSource::new(usize::MAX, 2, 1, 0);
        assert!(synthetic.next_frame().is_err());
    }

    #[test]
    fn test_frame_luma_view() {
        let frame = Frame {
            frame_id: 0,
            width: 2,
            height: 2,
            data: vec![1, 2, 3, 4],
        };
        let luma = frame.luma();
        assert_eq!((luma.width, luma.height, luma.stride), (2, 2, 2));
    }
}
