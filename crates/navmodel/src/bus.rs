//! メッセージバス
//!
//! 評価結果の送り先。トピック名とメッセージを受け取り、下流へ渡す。

use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Instant;

use serde::Serialize;

use crate::publish::NavModelMessage;

/// Errors from a message bus
#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("Bus I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 結果の送り先
pub trait MessageBus {
    fn publish(&mut self, topic: &str, message: &NavModelMessage) -> Result<(), BusError>;
}

/// JSON-lines の 1 行
#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    #[serde(rename = "logMonoTime")]
    log_mono_time: u64,
    valid: bool,
    #[serde(rename = "navModel")]
    nav_model: &'a NavModelMessage,
}

/// 1 メッセージ 1 行の JSON を書き出すバス
///
/// メッセージごとに flush する。
pub struct JsonLinesBus<W: Write> {
    writer: W,
    created: Instant,
}

impl<W: Write> JsonLinesBus<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            created: Instant::now(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MessageBus for JsonLinesBus<W> {
    fn publish(&mut self, topic: &str, message: &NavModelMessage) -> Result<(), BusError> {
        let envelope = Envelope {
            topic,
            log_mono_time: u64::try_from(self.created.elapsed().as_nanos()).unwrap_or(u64::MAX),
            valid: true,
            nav_model: message,
        };
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// メモリ上のバス（上限付き、溢れたら古いものから捨てる）
#[derive(Debug)]
pub struct MemoryBus {
    messages: VecDeque<(String, NavModelMessage)>,
    max_pending: usize,
}

impl MemoryBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            messages: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn drain(&mut self) -> Vec<(String, NavModelMessage)> {
        self.messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&(String, NavModelMessage)> {
        self.messages.back()
    }
}

impl MessageBus for MemoryBus {
    fn publish(&mut self, topic: &str, message: &NavModelMessage) -> Result<(), BusError> {
        if self.messages.len() >= self.max_pending {
            log::warn!("Memory bus full ({} messages), dropping oldest", self.max_pending);
            self.messages.pop_front();
        }
        self.messages.push_back((topic.to_string(), message.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::NavModelResult;
    use crate::publish::NAV_MODEL_TOPIC;

    fn message(frame_id: u32) -> NavModelMessage {
        let result: NavModelResult = bytemuck::Zeroable::zeroed();
        NavModelMessage::from_result(frame_id, &result, 0.5)
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_envelope() {
        let mut bus = JsonLinesBus::new(Vec::new());
        bus.publish(NAV_MODEL_TOPIC, &message(3)).unwrap();
        bus.publish(NAV_MODEL_TOPIC, &message(4)).unwrap();

        let out = String::from_utf8(bus.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["topic"], "navModel");
        assert_eq!(first["valid"], true);
        assert!(first["logMonoTime"].is_u64());
        assert_eq!(first["navModel"]["frameId"], 3);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["navModel"]["frameId"], 4);
        assert!(second["logMonoTime"].as_u64() >= first["logMonoTime"].as_u64());
    }

    #[test]
    fn test_json_lines_keeps_non_finite_values() {
        let mut flat = [0.0f32; crate::layout::NAV_OUTPUT_SIZE];
        flat[132] = f32::NEG_INFINITY;
        flat[133] = f32::INFINITY;
        flat[164] = f32::NAN;
        let msg = NavModelMessage::from_result(9, NavModelResult::from_flat(&flat), 0.5);

        let mut bus = JsonLinesBus::new(Vec::new());
        bus.publish(NAV_MODEL_TOPIC, &msg).unwrap();
        let out = String::from_utf8(bus.into_inner()).unwrap();
        assert!(!out.contains("null"), "non-finite value lost: {out}");

        let line: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        let back: NavModelMessage = serde_json::from_value(line["navModel"].clone()).unwrap();
        assert_eq!(back.frame_id, 9);
        assert_eq!(back.desire_prediction[0], f32::NEG_INFINITY);
        assert_eq!(back.desire_prediction[1], f32::INFINITY);
        assert!(back.features[0].is_nan());
        assert_eq!(back.features[1], 0.0);
    }

    #[test]
    fn test_json_lines_io_error() {
        let mut bus = JsonLinesBus::new(BrokenWriter);
        let err = bus.publish(NAV_MODEL_TOPIC, &message(1)).unwrap_err();
        assert!(matches!(err, BusError::Io(_)));
    }

    #[test]
    fn test_memory_bus_drops_oldest() {
        let mut bus = MemoryBus::new(2);
        assert!(bus.is_empty());
        for id in 1..=3 {
            bus.publish(NAV_MODEL_TOPIC, &message(id)).unwrap();
        }
        assert_eq!(bus.len(), 2);
        assert_eq!(bus.last().map(|(_, m)| m.frame_id), Some(3));

        let drained = bus.drain();
        let ids: Vec<u32> = drained.iter().map(|(_, m)| m.frame_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(drained.iter().all(|(t, _)| t == NAV_MODEL_TOPIC));
        assert!(bus.is_empty());
    }
}
