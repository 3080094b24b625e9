//! # navmodel
//!
//! ナビゲーションモデルの評価アダプタ。
//!
//! ## モジュール構成
//!
//! - `modeldata`: 軌跡インデックス表・カメラ較正定数
//! - `layout`: ネットワーク出力のフラットレイアウト
//! - `desire`: 進路意図クラス表
//! - `state`: 評価状態とライフサイクル（init / eval_frame / publish / free）
//! - `shared`: スレッド間共有ハンドル
//! - `runner`: ネットワーク実行エンジンの境界と CPU リファレンス実装
//! - `frame`: フレーム前処理
//! - `bus` / `publish`: 結果の送出
//!

// 定数表
pub mod desire;
pub mod mat;
pub mod modeldata;

// 出力レイアウト
pub mod layout;

// 評価
pub mod error;
pub mod frame;
pub mod runner;
pub mod shared;
pub mod state;

// 送出
pub mod bus;
pub mod publish;

pub use error::{NavModelError, Result};
pub use layout::{NAV_INPUT_SIZE, NAV_NET_OUTPUT_SIZE, NAV_OUTPUT_SIZE, NavModelResult};
pub use publish::{NAV_MODEL_TOPIC, NavModelMessage, publish};
pub use shared::{EvalGuard, SharedNavModel};
pub use state::{NavModelState, Phase};
