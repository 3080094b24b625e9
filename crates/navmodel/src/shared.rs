//! スレッド間で共有する評価ハンドル
//!
//! ロックは `try_lock` しか使わない。評価中の状態に別スレッドが触れると
//! 待たずに `PreconditionViolation` を返す。

use std::ops::Deref;

use parking_lot::{Mutex, MutexGuard};

use crate::bus::MessageBus;
use crate::error::{NavModelError, Result};
use crate::frame::ModelInput;
use crate::layout::NavModelResult;
use crate::runner::ModelRunner;
use crate::state::{NavModelState, Phase};

/// 共有評価ハンドル
#[derive(Debug)]
pub struct SharedNavModel {
    inner: Mutex<NavModelState>,
}

/// 評価結果の借用
///
/// 生きている間は状態を占有し続ける。
pub struct EvalGuard<'a> {
    guard: MutexGuard<'a, NavModelState>,
}

impl Deref for EvalGuard<'_> {
    type Target = NavModelResult;

    fn deref(&self) -> &NavModelResult {
        self.guard.output_view()
    }
}

impl std::fmt::Debug for EvalGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalGuard")
            .field("dsp_execution_time", &self.dsp_execution_time)
            .finish_non_exhaustive()
    }
}

impl EvalGuard<'_> {
    /// 保持中の結果をバスに送る
    pub fn publish<B: MessageBus + ?Sized>(
        &self,
        bus: &mut B,
        frame_id: u32,
        execution_time: f32,
    ) -> Result<()> {
        self.guard.publish(bus, frame_id, execution_time)
    }
}

fn busy(operation: &'static str) -> NavModelError {
    NavModelError::PreconditionViolation {
        operation,
        phase: Phase::Evaluating,
    }
}

impl SharedNavModel {
    pub fn new(state: NavModelState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    fn claim(&self, operation: &'static str) -> Result<MutexGuard<'_, NavModelState>> {
        self.inner.try_lock().ok_or_else(|| {
            log::error!("{operation} rejected: evaluation already in flight");
            busy(operation)
        })
    }

    /// 1 フレームを評価し、結果を借用したまま返す
    pub fn eval_frame(&self, frame: &dyn ModelInput) -> Result<EvalGuard<'_>> {
        let mut guard = self.claim("eval_frame")?;
        guard.eval_frame(frame)?;
        Ok(EvalGuard { guard })
    }

    pub fn publish<B: MessageBus + ?Sized>(
        &self,
        bus: &mut B,
        frame_id: u32,
        execution_time: f32,
    ) -> Result<()> {
        self.claim("publish")?.publish(bus, frame_id, execution_time)
    }

    pub fn init(&self, runner: Box<dyn ModelRunner>) -> Result<()> {
        self.claim("init")?.init(runner)
    }

    pub fn free(&self) -> Result<()> {
        self.claim("free")?.free()
    }

    /// 現在の段階（評価中なら `None`）
    pub fn phase(&self) -> Option<Phase> {
        self.inner.try_lock().map(|s| s.phase())
    }

    pub fn into_inner(self) -> NavModelState {
        self.inner.into_inner()
    }
}
