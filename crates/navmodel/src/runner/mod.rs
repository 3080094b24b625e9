//! モデルランナー
//!
//! ニューラルネットワーク実行エンジンとの境界。ランナーは入力バイト列を受け取り、
//! 出力 float 列を書き込むだけのブラックボックスとして扱う。
//! バックエンド（アクセラレータ、CPU リファレンス等）ごとに 1 実装を持つ。
//!
//! ランナーに渡す出力スライスは `NAV_NET_OUTPUT_SIZE` 長で、末尾の実行時間
//! スロットには触れられない。

mod reference;
mod weights;

pub use reference::{POOL_FACTOR, POOLED_INPUT_SIZE, POOLED_WIDTH, ReferenceRunner};
pub use weights::{NAVW_MAGIC, NAVW_VERSION, NavwHeader, ReferenceWeights, read_navw};

/// ランナーのエラー
#[derive(thiserror::Error, Debug)]
pub enum RunnerError {
    /// File I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid NAVW magic: {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("Unsupported NAVW version: {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Section truncated: {0}")]
    Truncated(&'static str),

    #[error("Trailing data after weights: {0} bytes")]
    TrailingData(u64),

    /// execute が load より先に呼ばれた
    #[error("Runner not loaded")]
    NotLoaded,

    /// 実行時の障害
    #[error("Execution fault: {0}")]
    Execution(String),
}

/// ネットワーク実行エンジンの抽象
pub trait ModelRunner: Send {
    /// バックエンド名（ログ用）
    fn name(&self) -> &str;

    /// 入出力の次元を検証して実行可能状態にする
    ///
    /// `input_len` はバイト数、`output_len` は float 数（実行時間スロットを除く）。
    fn load(&mut self, input_len: usize, output_len: usize) -> Result<(), RunnerError>;

    /// 1 回の推論を同期実行する
    ///
    /// `output` の全要素を書き込むこと。失敗時の `output` の内容は未定義。
    fn execute(&mut self, input: &[u8], output: &mut [f32]) -> Result<(), RunnerError>;
}
