//! 評価結果のパブリッシュ
//!
//! 結果構造体からメッセージへの構造的な写像。値の変換（正規化や指数化）は
//! 一切しない。
//!
//! JSON は NaN と ±inf を表現できないので、非有限値は文字列
//! `"NaN"` / `"inf"` / `"-inf"` として書き出し、読み戻しで元の値に戻す。

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bus::MessageBus;
use crate::error::Result;
use crate::layout::{NavModelOutputXY, NavModelResult};

/// パブリッシュ先のトピック名
pub const NAV_MODEL_TOPIC: &str = "navModel";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XYMessage {
    #[serde(with = "lossless_f32")]
    pub x: f32,
    #[serde(with = "lossless_f32")]
    pub y: f32,
}

impl From<NavModelOutputXY> for XYMessage {
    fn from(p: NavModelOutputXY) -> Self {
        Self { x: p.x, y: p.y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMessage {
    pub mean: Vec<XYMessage>,
    pub std: Vec<XYMessage>,
}

/// `navModel` トピックのメッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavModelMessage {
    pub frame_id: u32,
    pub plan: PlanMessage,
    /// desire スコア（予約スロットを含む 32 要素）
    #[serde(with = "lossless_f32_vec")]
    pub desire_prediction: Vec<f32>,
    #[serde(with = "lossless_f32_vec")]
    pub features: Vec<f32>,
    /// ランナー実行時間 [s]
    #[serde(with = "lossless_f32")]
    pub dsp_execution_time: f32,
    /// 呼び出し側が計測した全体の実行時間 [s]
    #[serde(with = "lossless_f32")]
    pub model_execution_time: f32,
}

impl NavModelMessage {
    pub fn from_result(frame_id: u32, result: &NavModelResult, execution_time: f32) -> Self {
        Self {
            frame_id,
            plan: PlanMessage {
                mean: result.plan.mean.iter().copied().map(XYMessage::from).collect(),
                std: result.plan.std.iter().copied().map(XYMessage::from).collect(),
            },
            desire_prediction: result.desire_pred.values.to_vec(),
            features: result.features.values.to_vec(),
            dsp_execution_time: result.dsp_execution_time,
            model_execution_time: execution_time,
        }
    }
}

/// JSON 上の f32。有限値は数値、非有限値は文字列
#[derive(Debug, Clone, Copy)]
struct LosslessF32(f32);

impl Serialize for LosslessF32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let v = self.0;
        if v.is_finite() {
            serializer.serialize_f32(v)
        } else if v.is_nan() {
            serializer.serialize_str("NaN")
        } else if v > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireF32 {
    Number(f32),
    Text(String),
}

impl<'de> Deserialize<'de> for LosslessF32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match WireF32::deserialize(deserializer)? {
            WireF32::Number(v) => Ok(Self(v)),
            WireF32::Text(s) => match s.as_str() {
                "NaN" => Ok(Self(f32::NAN)),
                "inf" => Ok(Self(f32::INFINITY)),
                "-inf" => Ok(Self(f32::NEG_INFINITY)),
                other => Err(D::Error::custom(format!("invalid float literal {other:?}"))),
            },
        }
    }
}

mod lossless_f32 {
    use super::*;

    pub fn serialize<S: Serializer>(v: &f32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        LosslessF32(*v).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f32, D::Error> {
        LosslessF32::deserialize(deserializer).map(|v| v.0)
    }
}

mod lossless_f32_vec {
    use super::*;

    pub fn serialize<S: Serializer>(
        values: &[f32],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|&v| LosslessF32(v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<f32>, D::Error> {
        let values = Vec::<LosslessF32>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.0).collect())
    }
}

/// 結果を `navModel` トピックに送る
pub fn publish<B: MessageBus + ?Sized>(
    bus: &mut B,
    frame_id: u32,
    result: &NavModelResult,
    execution_time: f32,
) -> Result<()> {
    let message = NavModelMessage::from_result(frame_id, result, execution_time);
    bus.publish(NAV_MODEL_TOPIC, &message)?;
    Ok(())
}
