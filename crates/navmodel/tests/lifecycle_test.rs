//! ライフサイクル統合テスト
//!
//! スタブランナーで init → eval_frame → publish → free の一連を確認する。

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use navmodel::bus::MemoryBus;
use navmodel::frame::VisionBuf;
use navmodel::runner::{ModelRunner, RunnerError};
use navmodel::state::Stopwatch;
use navmodel::{
    NAV_INPUT_SIZE, NAV_NET_OUTPUT_SIZE, NAV_MODEL_TOPIC, NavModelError, NavModelState, Phase,
    SharedNavModel,
};

/// 全出力に固定値を書くランナー
struct ConstRunner(f32);

impl ModelRunner for ConstRunner {
    fn name(&self) -> &str {
        "const"
    }

    fn load(&mut self, input_len: usize, output_len: usize) -> Result<(), RunnerError> {
        assert_eq!(input_len, NAV_INPUT_SIZE);
        assert_eq!(output_len, NAV_NET_OUTPUT_SIZE);
        Ok(())
    }

    fn execute(&mut self, _input: &[u8], output: &mut [f32]) -> Result<(), RunnerError> {
        assert_eq!(output.len(), NAV_NET_OUTPUT_SIZE);
        output.fill(self.0);
        Ok(())
    }
}

/// 1 回目だけ成功し、以降は失敗するランナー
struct FlakyRunner {
    calls: usize,
}

impl ModelRunner for FlakyRunner {
    fn name(&self) -> &str {
        "flaky"
    }

    fn load(&mut self, _input_len: usize, _output_len: usize) -> Result<(), RunnerError> {
        Ok(())
    }

    fn execute(&mut self, _input: &[u8], output: &mut [f32]) -> Result<(), RunnerError> {
        self.calls += 1;
        if self.calls > 1 {
            return Err(RunnerError::Execution("accelerator timeout".to_string()));
        }
        output.fill(3.0);
        Ok(())
    }
}

/// 実行開始を通知し、解放されるまで戻らないランナー
struct BlockingRunner {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

impl ModelRunner for BlockingRunner {
    fn name(&self) -> &str {
        "blocking"
    }

    fn load(&mut self, _input_len: usize, _output_len: usize) -> Result<(), RunnerError> {
        Ok(())
    }

    fn execute(&mut self, _input: &[u8], output: &mut [f32]) -> Result<(), RunnerError> {
        self.entered.send(()).map_err(|e| RunnerError::Execution(e.to_string()))?;
        self.release.recv().map_err(|e| RunnerError::Execution(e.to_string()))?;
        output.fill(1.0);
        Ok(())
    }
}

/// 固定値を返す計測器
struct FixedStopwatch(f32);

impl Stopwatch for FixedStopwatch {
    fn start(&mut self) {}

    fn elapsed_secs(&mut self) -> f32 {
        self.0
    }
}

fn frame_bytes() -> Vec<u8> {
    vec![128u8; NAV_INPUT_SIZE]
}

#[test]
fn test_eval_writes_runner_output_and_timing() {
    let mut state = NavModelState::with_runner(Box::new(ConstRunner(1.0)))
        .unwrap()
        .with_stopwatch(Box::new(FixedStopwatch(2.5)));
    let data = frame_bytes();

    let result = state.eval_frame(&VisionBuf::new(&data)).unwrap();
    assert_eq!(result.features.values[0], 1.0);
    assert_eq!(result.plan.mean[0].x, 1.0);
    assert_eq!(result.desire_pred.values[31], 1.0);
    assert!(result.net_output().iter().all(|&v| v == 1.0));
    assert_eq!(result.dsp_execution_time, 2.5);
}

#[test]
fn test_publish_after_eval() {
    let mut state = NavModelState::with_runner(Box::new(ConstRunner(0.25)))
        .unwrap()
        .with_stopwatch(Box::new(FixedStopwatch(0.01)));
    let data = frame_bytes();
    let mut bus = MemoryBus::new(8);

    state.eval_frame(&VisionBuf::new(&data)).unwrap();
    state.publish(&mut bus, 11, 0.02).unwrap();

    let (topic, msg) = bus.last().unwrap();
    assert_eq!(topic, NAV_MODEL_TOPIC);
    assert_eq!(msg.frame_id, 11);
    assert_eq!(msg.features[0], 0.25);
    assert_eq!(msg.dsp_execution_time, 0.01);
    assert_eq!(msg.model_execution_time, 0.02);
}

#[test]
fn test_publish_before_eval_is_violation() {
    let state = NavModelState::with_runner(Box::new(ConstRunner(0.0))).unwrap();
    let mut bus = MemoryBus::new(8);
    let err = state.publish(&mut bus, 1, 0.0).unwrap_err();
    assert!(matches!(err, NavModelError::PreconditionViolation { operation: "publish", .. }));
    assert!(bus.is_empty());
}

#[test]
fn test_failure_forbids_publish_of_stale_result() {
    let mut state = NavModelState::with_runner(Box::new(FlakyRunner { calls: 0 })).unwrap();
    let data = frame_bytes();
    let mut bus = MemoryBus::new(8);

    state.eval_frame(&VisionBuf::new(&data)).unwrap();
    state.publish(&mut bus, 1, 0.0).unwrap();

    let err = state.eval_frame(&VisionBuf::new(&data)).unwrap_err();
    assert!(matches!(err, NavModelError::InferenceFailure(_)));
    assert_eq!(state.phase(), Phase::Faulted);

    // 失敗後に前フレームの結果を publish しようとするのは誤用
    let err = state.publish(&mut bus, 2, 0.0).unwrap_err();
    assert!(matches!(
        err,
        NavModelError::PreconditionViolation {
            operation: "publish",
            phase: Phase::Faulted
        }
    ));
    assert_eq!(bus.len(), 1);
}

#[test]
fn test_free_and_reinit_resets_buffers() {
    let mut state = NavModelState::with_runner(Box::new(ConstRunner(9.0))).unwrap();
    let data = frame_bytes();
    state.eval_frame(&VisionBuf::new(&data)).unwrap();
    assert!(state.input().iter().all(|&b| b == 128));

    state.free().unwrap();
    assert_eq!(state.phase(), Phase::Uninitialized);
    assert!(state.result().is_none());

    state.init(Box::new(ConstRunner(4.0))).unwrap();
    assert_eq!(state.phase(), Phase::Ready);
    assert!(state.input().iter().all(|&b| b == 0));
    let result = state.eval_frame(&VisionBuf::new(&data)).unwrap();
    assert_eq!(result.features.values[10], 4.0);
}

#[test]
fn test_concurrent_eval_is_rejected() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let runner = BlockingRunner {
        entered: entered_tx,
        release: release_rx,
    };
    let shared = SharedNavModel::new(NavModelState::with_runner(Box::new(runner)).unwrap());
    let data = frame_bytes();

    thread::scope(|s| {
        let worker = s.spawn(|| {
            let guard = shared.eval_frame(&VisionBuf::new(&data)).unwrap();
            guard.features.values[0]
        });

        entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        let err = shared.eval_frame(&VisionBuf::new(&data)).unwrap_err();
        assert!(matches!(
            err,
            NavModelError::PreconditionViolation {
                operation: "eval_frame",
                phase: Phase::Evaluating
            }
        ));

        release_tx.send(()).unwrap();
        assert_eq!(worker.join().unwrap(), 1.0);
    });

    // ガード解放後は再び評価できる
    release_tx.send(()).unwrap();
    let guard = shared.eval_frame(&VisionBuf::new(&data)).unwrap();
    assert_eq!(guard.features.values[0], 1.0);
}
