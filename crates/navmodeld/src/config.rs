//! デーモン設定（TOML）
//!
//! すべての項目に既定値がある。CLI 引数で上書きしたあと `validate` を通す。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

/// 入力フレームの幅・高さの上限
pub const MAX_INPUT_DIM: usize = 8192;

/// ランナーのバックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// NAVW 重みを読む CPU リファレンス
    #[default]
    Reference,
    /// 全重みゼロ（配線確認用）
    Zero,
}

/// フレームの入力元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// 生の輝度プレーンを連結したファイル
    #[default]
    Raw,
    /// 乱数フレーム
    Synthetic,
}

/// 推論失敗時の方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// そのフレームを捨てて続行
    #[default]
    Skip,
    /// ランナーを作り直して続行
    Reinit,
    /// エラーで終了
    Abort,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub backend: Backend,
    /// `reference` のとき必須
    pub weights: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub source: SourceKind,
    /// `-` は標準入力
    pub path: String,
    pub width: usize,
    pub height: usize,
    /// synthetic のフレーム数（0 = 無制限）
    pub frames: u64,
    /// synthetic の乱数シード
    pub seed: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Raw,
            path: "-".to_string(),
            width: 256,
            height: 256,
            frames: 0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// JSON-lines の出力先。`-` は標準出力
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub on_failure: FailurePolicy,
    /// 0 = 入力が尽きるまで
    pub max_frames: u64,
    /// SCHED_FIFO 優先度（0 = 変更しない）
    pub realtime_priority: i32,
    /// 固定する CPU 番号
    pub core_affinity: Vec<usize>,
}

/// デーモン設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub model: ModelConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub runtime: RuntimeConfig,
}

impl DaemonConfig {
    /// ファイルから読み込み
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// ループ開始前の検証
    pub fn validate(&self) -> Result<()> {
        if self.model.backend == Backend::Reference && self.model.weights.is_none() {
            bail!("backend \"reference\" requires model.weights");
        }
        ensure!(
            self.input.width > 0 && self.input.height > 0,
            "input geometry must be non-empty, got {}x{}",
            self.input.width,
            self.input.height
        );
        ensure!(
            self.input.width <= MAX_INPUT_DIM && self.input.height <= MAX_INPUT_DIM,
            "input geometry {}x{} exceeds {MAX_INPUT_DIM}x{MAX_INPUT_DIM}",
            self.input.width,
            self.input.height
        );
        ensure!(
            self.runtime.realtime_priority >= 0,
            "realtime_priority must be non-negative, got {}",
            self.runtime.realtime_priority
        );
        Ok(())
    }
}
