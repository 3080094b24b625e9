//! 評価状態とライフサイクル
//!
//! ```text
//! Uninitialized --init--> Ready --eval_frame--> Ready | Faulted
//! Ready / Faulted --free--> Uninitialized
//! ```
//!
//! 入出力バッファは状態が所有し、`eval_frame` が返す結果は出力バッファの
//! 再解釈（コピーなし）。返り値の借用が `&mut self` に紐づくため、次の
//! `eval_frame` までしか使えないことをコンパイラが保証する。

use std::time::Instant;

use crate::bus::MessageBus;
use crate::error::{NavModelError, Result};
use crate::frame::ModelInput;
use crate::layout::{
    DSP_EXECUTION_TIME_INDEX, NAV_INPUT_SIZE, NAV_NET_OUTPUT_SIZE, NAV_OUTPUT_SIZE, NavModelResult,
};
use crate::publish;
use crate::runner::ModelRunner;

/// ライフサイクルの段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// ランナー未設定（生成直後または free 後）
    Uninitialized,
    /// 評価可能
    Ready,
    /// ランナー実行中
    ///
    /// 呼び出しの外でこの段階が見えるのは、評価中にパニックした状態を
    /// 呼び出し側が拾った場合だけ。
    Evaluating,
    /// 直前の評価でランナーが失敗した
    Faulted,
}

impl Phase {
    /// eval_frame を受け付けるか
    pub fn can_eval(&self) -> bool {
        matches!(self, Phase::Ready)
    }

    /// init を受け付けるか
    pub fn can_init(&self) -> bool {
        matches!(self, Phase::Uninitialized)
    }

    /// ランナーを保持しているか
    pub fn is_bound(&self) -> bool {
        !matches!(self, Phase::Uninitialized)
    }
}

/// ランナー実行時間の計測
pub trait Stopwatch: Send {
    fn start(&mut self);

    /// start からの経過秒
    fn elapsed_secs(&mut self) -> f32;
}

/// `Instant` による計測（既定）
#[derive(Debug, Default)]
pub struct MonotonicStopwatch {
    started: Option<Instant>,
}

impl Stopwatch for MonotonicStopwatch {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn elapsed_secs(&mut self) -> f32 {
        self.started.map(|s| s.elapsed().as_secs_f32()).unwrap_or(0.0)
    }
}

/// ナビゲーションモデルの評価状態
pub struct NavModelState {
    runner: Option<Box<dyn ModelRunner>>,
    input: Box<[u8; NAV_INPUT_SIZE]>,
    output: Box<[f32; NAV_OUTPUT_SIZE]>,
    stopwatch: Box<dyn Stopwatch>,
    phase: Phase,
    /// 出力バッファが publish 可能な結果を保持しているか
    has_result: bool,
}

impl Default for NavModelState {
    fn default() -> Self {
        Self::new()
    }
}

impl NavModelState {
    /// 未初期化の状態を作成
    pub fn new() -> Self {
        Self {
            runner: None,
            input: Box::new([0; NAV_INPUT_SIZE]),
            output: Box::new([0.0; NAV_OUTPUT_SIZE]),
            stopwatch: Box::new(MonotonicStopwatch::default()),
            phase: Phase::Uninitialized,
            has_result: false,
        }
    }

    /// 作成してそのまま init する
    pub fn with_runner(runner: Box<dyn ModelRunner>) -> Result<Self> {
        let mut state = Self::new();
        state.init(runner)?;
        Ok(state)
    }

    /// 実行時間の計測方法を差し替える
    pub fn with_stopwatch(mut self, stopwatch: Box<dyn Stopwatch>) -> Self {
        self.stopwatch = stopwatch;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 設定中のランナー名
    pub fn runner_name(&self) -> Option<&str> {
        self.runner.as_deref().map(|r| r.name())
    }

    fn precondition(&self, operation: &'static str) -> NavModelError {
        NavModelError::PreconditionViolation {
            operation,
            phase: self.phase,
        }
    }

    /// ランナーを設定し、バッファをゼロ初期化する
    pub fn init(&mut self, mut runner: Box<dyn ModelRunner>) -> Result<()> {
        if !self.phase.can_init() {
            return Err(self.precondition("init"));
        }

        runner.load(NAV_INPUT_SIZE, NAV_NET_OUTPUT_SIZE).map_err(|e| {
            NavModelError::Configuration(format!(
                "runner '{}' rejected buffer sizes: {e}",
                runner.name()
            ))
        })?;

        self.input.fill(0);
        self.output.fill(0.0);
        log::info!(
            "Navigation model initialized: runner={}, input={} bytes, output={} floats",
            runner.name(),
            NAV_INPUT_SIZE,
            NAV_OUTPUT_SIZE
        );
        self.runner = Some(runner);
        self.phase = Phase::Ready;
        self.has_result = false;
        Ok(())
    }

    /// 設定中のランナーのまま再 init する（`Faulted` からの復帰用）
    ///
    /// ランナーが load を拒否した場合は `Uninitialized` に戻る。
    pub fn reset(&mut self) -> Result<()> {
        if !self.phase.is_bound() {
            return Err(self.precondition("reset"));
        }
        let Some(runner) = self.runner.take() else {
            return Err(self.precondition("reset"));
        };
        log::info!("Re-initializing navigation model from phase {:?}", self.phase);
        self.phase = Phase::Uninitialized;
        self.has_result = false;
        self.init(runner)
    }

    /// 1 フレームを評価する
    ///
    /// 前処理の失敗は `Ready` のまま返る（結果は publish 不可になる）。
    /// ランナーの失敗は `Faulted` に遷移し、再 init まで評価できない。
    pub fn eval_frame(&mut self, frame: &dyn ModelInput) -> Result<&NavModelResult> {
        if !self.phase.can_eval() {
            return Err(self.precondition("eval_frame"));
        }
        self.has_result = false;

        frame.write_input(&mut self.input)?;

        let Some(runner) = self.runner.as_mut() else {
            return Err(self.precondition("eval_frame"));
        };

        self.phase = Phase::Evaluating;
        self.stopwatch.start();
        let outcome = runner.execute(&self.input[..], &mut self.output[..NAV_NET_OUTPUT_SIZE]);
        let elapsed = self.stopwatch.elapsed_secs();

        if let Err(e) = outcome {
            log::error!("Runner '{}' failed: {e}", runner.name());
            self.phase = Phase::Faulted;
            return Err(NavModelError::InferenceFailure(e));
        }

        self.output[DSP_EXECUTION_TIME_INDEX] = elapsed;
        self.phase = Phase::Ready;
        self.has_result = true;
        log::debug!("eval_frame: runner took {:.3} ms", elapsed * 1000.0);
        Ok(NavModelResult::from_flat(&self.output))
    }

    /// 直前の成功した評価結果
    pub fn result(&self) -> Option<&NavModelResult> {
        if self.phase == Phase::Ready && self.has_result {
            Some(NavModelResult::from_flat(&self.output))
        } else {
            None
        }
    }

    /// 出力バッファの再解釈（publish 可否を問わない）
    pub(crate) fn output_view(&self) -> &NavModelResult {
        NavModelResult::from_flat(&self.output)
    }

    /// 直前の結果をバスに送る
    pub fn publish<B: MessageBus + ?Sized>(
        &self,
        bus: &mut B,
        frame_id: u32,
        execution_time: f32,
    ) -> Result<()> {
        let result = self.result().ok_or_else(|| self.precondition("publish"))?;
        publish::publish(bus, frame_id, result, execution_time)
    }

    /// ランナーを解放し、バッファをゼロに戻す
    pub fn free(&mut self) -> Result<()> {
        if !self.phase.is_bound() {
            return Err(self.precondition("free"));
        }
        if let Some(runner) = self.runner.take() {
            log::info!("Navigation model freed: runner={}", runner.name());
        }
        self.input.fill(0);
        self.output.fill(0.0);
        self.phase = Phase::Uninitialized;
        self.has_result = false;
        Ok(())
    }

    /// 入力バッファ（前処理の確認用）
    pub fn input(&self) -> &[u8; NAV_INPUT_SIZE] {
        &self.input
    }
}

impl std::fmt::Debug for NavModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavModelState")
            .field("runner", &self.runner_name())
            .field("phase", &self.phase)
            .field("has_result", &self.has_result)
            .finish()
    }
}
