//! フレームループ
//!
//! 入力元からフレームを取り出し、評価してバスに送る。Ctrl-C で現在の
//! フレームを処理し終えてから止まる。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use navmodel::bus::{JsonLinesBus, MessageBus};
use navmodel::runner::{ModelRunner, ReferenceRunner};
use navmodel::{NavModelError, NavModelState};

use crate::config::{Backend, DaemonConfig, FailurePolicy, ModelConfig};
use crate::sched;
use crate::source::{FrameSource, open_source};

/// ループの集計
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// 受け取ったフレーム数
    pub frames: u64,
    pub published: u64,
    /// フレーム ID の欠番から推定した取りこぼし数
    pub dropped: u64,
    /// 推論失敗数
    pub failures: u64,
    /// ランナーを作り直した回数
    pub reinits: u64,
    /// 評価時間の合計 [s]
    pub total_eval_secs: f64,
}

impl FrameStats {
    /// 1 フレームあたりの平均評価時間 [ms]
    pub fn mean_eval_ms(&self) -> f64 {
        if self.published == 0 {
            return 0.0;
        }
        self.total_eval_secs * 1000.0 / self.published as f64
    }
}

/// 設定からランナーを作る
pub fn build_runner(model: &ModelConfig) -> Result<Box<dyn ModelRunner>> {
    match model.backend {
        Backend::Zero => Ok(Box::new(ReferenceRunner::zero())),
        Backend::Reference => {
            let Some(path) = model.weights.as_deref() else {
                bail!("backend \"reference\" requires model.weights");
            };
            let runner = ReferenceRunner::from_file(path)
                .with_context(|| format!("failed to load weights {}", path.display()))?;
            Ok(Box::new(runner))
        }
    }
}

/// ランナーを作る関数
pub type RunnerFactory<'a> = Box<dyn FnMut() -> Result<Box<dyn ModelRunner>> + 'a>;

/// フレームループ本体
pub struct FrameLoop<'a> {
    state: NavModelState,
    make_runner: RunnerFactory<'a>,
    on_failure: FailurePolicy,
    /// 0 = 入力が尽きるまで
    max_frames: u64,
}

impl<'a> FrameLoop<'a> {
    pub fn new(
        mut make_runner: RunnerFactory<'a>,
        on_failure: FailurePolicy,
        max_frames: u64,
    ) -> Result<Self> {
        let runner = make_runner()?;
        let state = NavModelState::with_runner(runner).context("failed to initialize model")?;
        Ok(Self {
            state,
            make_runner,
            on_failure,
            max_frames,
        })
    }

    pub fn state(&self) -> &NavModelState {
        &self.state
    }

    /// 入力が尽きるか、上限に達するか、停止要求が来るまで回す
    ///
    /// `stop` はフレームの合間にだけ確認する。ctrlc のハンドラは SA_RESTART で
    /// 登録されるため、`next_frame` が stdin の read でブロックしている間は
    /// 停止要求が来ても戻らず、次のフレームが届くか入力が閉じるまで止まらない。
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        bus: &mut dyn MessageBus,
        stop: &AtomicBool,
    ) -> Result<FrameStats> {
        let mut stats = FrameStats::default();
        let mut last_frame_id: Option<u32> = None;

        while !stop.load(Ordering::Relaxed) {
            if self.max_frames != 0 && stats.frames >= self.max_frames {
                break;
            }
            let Some(frame) = source.next_frame()? else {
                break;
            };
            stats.frames += 1;

            if let Some(last) = last_frame_id
                && frame.frame_id.saturating_sub(last) > 1
            {
                let gap = u64::from(frame.frame_id - last - 1);
                stats.dropped += gap;
                log::warn!("Frame drop: {gap} frame(s) missing before {}", frame.frame_id);
            }
            last_frame_id = Some(frame.frame_id);

            let start = Instant::now();
            match self.state.eval_frame(&frame.luma()) {
                Ok(_) => {}
                Err(NavModelError::InferenceFailure(e)) => {
                    stats.failures += 1;
                    self.recover(frame.frame_id, &e.to_string(), &mut stats)?;
                    continue;
                }
                Err(e) => {
                    log::error!("Frame {} rejected: {e}", frame.frame_id);
                    return Err(e).context("fatal evaluation error");
                }
            }
            let elapsed = start.elapsed().as_secs_f32();

            self.state
                .publish(bus, frame.frame_id, elapsed)
                .with_context(|| format!("failed to publish frame {}", frame.frame_id))?;
            stats.published += 1;
            stats.total_eval_secs += f64::from(elapsed);
            log::debug!("Frame {} published in {:.3} ms", frame.frame_id, elapsed * 1000.0);
        }

        if stop.load(Ordering::Relaxed) {
            log::info!("Stop requested, leaving frame loop");
        }
        log::info!(
            "Frame loop finished: frames={}, published={}, dropped={}, failures={}, reinits={}, mean_eval={:.3} ms",
            stats.frames,
            stats.published,
            stats.dropped,
            stats.failures,
            stats.reinits,
            stats.mean_eval_ms()
        );
        Ok(stats)
    }

    fn recover(&mut self, frame_id: u32, reason: &str, stats: &mut FrameStats) -> Result<()> {
        match self.on_failure {
            FailurePolicy::Abort => {
                bail!("inference failed on frame {frame_id}: {reason}");
            }
            FailurePolicy::Skip => {
                log::warn!("Skipping frame {frame_id} after inference failure");
                self.state.reset().context("failed to re-arm model")?;
            }
            FailurePolicy::Reinit => {
                log::warn!("Rebuilding runner after inference failure on frame {frame_id}");
                self.state.free()?;
                let runner = (self.make_runner)()?;
                self.state.init(runner).context("failed to re-initialize model")?;
                stats.reinits += 1;
            }
        }
        Ok(())
    }
}

fn open_output(path: &str) -> Result<Box<dyn Write>> {
    if path == "-" {
        return Ok(Box::new(io::stdout().lock()));
    }
    let file = File::create(path).with_context(|| format!("failed to create output {path}"))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// 設定どおりにデーモンを動かす
pub fn run(cfg: &DaemonConfig, stop: &AtomicBool) -> Result<FrameStats> {
    cfg.validate().context("invalid configuration")?;

    let model = cfg.model.clone();
    let mut frame_loop = FrameLoop::new(
        Box::new(move || build_runner(&model)),
        cfg.runtime.on_failure,
        cfg.runtime.max_frames,
    )?;
    if let Some(name) = frame_loop.state().runner_name() {
        log::info!("Runner: {name}");
    }

    sched::apply(cfg.runtime.realtime_priority, &cfg.runtime.core_affinity);

    let mut source = open_source(&cfg.input)?;
    let mut bus = JsonLinesBus::new(open_output(&cfg.output.path)?);
    frame_loop.run(source.as_mut(), &mut bus, stop)
}
