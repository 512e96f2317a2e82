//! 帧调度：把纯 tick 函数包装成按帧运行的 tokio 任务
//!
//! 每个实例一个任务、一个循环，tick 串行执行、不可重入；输入通过 watch 通道以整体快照推入，
//! 输出同样以快照经 watch 发布，事件走 broadcast。取消 token 后循环在下一次 select 时退出，
//! 揭示实例随之卸载。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::{Phase, RevealError, RevealResult};
use crate::reveal::{HierarchicalStreamReveal, RevealEvent, RevealSnapshot, SubQuestionRecord};
use crate::throttle::{BackendSignals, StatusBadge};

/// 事件广播缓冲；渲染端落后时丢弃最旧事件
const EVENT_CAPACITY: usize = 256;

/// 当前帧时刻；暂停时钟（测试）下同样单调前进
fn frame_now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

/// 帧对齐循环：错过的帧直接跳过，不补跑
async fn run_frames<F>(frame: Duration, token: CancellationToken, mut on_frame: F)
where
    F: FnMut(std::time::Instant),
{
    let mut interval = tokio::time::interval(frame);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => on_frame(frame_now()),
        }
    }
}

/// 发往揭示循环的控制指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealControl {
    /// 立即揭示到权威数据的当前全部内容
    FastForward,
}

/// 揭示任务句柄
pub struct RevealHandle {
    input_tx: watch::Sender<Arc<Vec<SubQuestionRecord>>>,
    control_tx: mpsc::UnboundedSender<RevealControl>,
    snapshot_rx: watch::Receiver<RevealSnapshot>,
    events_tx: broadcast::Sender<RevealEvent>,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl RevealHandle {
    /// 推入最新的权威记录数组（整体替换）
    pub fn push(&self, records: Vec<SubQuestionRecord>) -> RevealResult<()> {
        if self.token.is_cancelled() {
            return Err(RevealError::SchedulerClosed);
        }
        self.input_tx
            .send(Arc::new(records))
            .map_err(|_| RevealError::SchedulerClosed)
    }

    /// 上游判定流已停滞或提前结束时调用
    pub fn fast_forward(&self) -> RevealResult<()> {
        if self.token.is_cancelled() {
            return Err(RevealError::SchedulerClosed);
        }
        self.control_tx
            .send(RevealControl::FastForward)
            .map_err(|_| RevealError::SchedulerClosed)
    }

    pub fn snapshot(&self) -> RevealSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<RevealSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RevealEvent> {
        self.events_tx.subscribe()
    }

    /// 卸载：停止帧循环，之后 push 返回 SchedulerClosed
    pub fn unmount(&self) {
        self.token.cancel();
    }

    pub fn is_unmounted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 等待帧循环退出
    pub async fn closed(self) {
        if let Err(e) = self.join.await {
            tracing::warn!("Reveal loop ended abnormally: {}", e);
        }
    }
}

/// 启动一个揭示实例的帧循环
pub fn spawn_reveal(
    mut engine: HierarchicalStreamReveal,
    frame: Duration,
    token: CancellationToken,
) -> RevealHandle {
    let (input_tx, input_rx) = watch::channel(Arc::new(Vec::new()));
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
    let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();

    let loop_token = token.clone();
    let loop_events = events_tx.clone();
    let join = tokio::spawn(async move {
        tracing::info!(frame_ms = frame.as_millis() as u64, "Reveal loop started");
        run_frames(frame, loop_token, |now| {
            let records = input_rx.borrow().clone();
            let mut report = engine.tick(&records, now);
            while let Ok(RevealControl::FastForward) = control_rx.try_recv() {
                report.events.extend(engine.fast_forward(&records, now).events);
            }
            // 内容相同的快照不唤醒订阅者
            snapshot_tx.send_if_modified(|current| {
                let next = engine.snapshot();
                if **current == *next {
                    return false;
                }
                *current = next;
                true
            });
            for ev in report.events {
                let _ = loop_events.send(ev);
            }
        })
        .await;
        engine.unmount();
        tracing::info!("Reveal loop stopped");
    });

    RevealHandle {
        input_tx,
        control_tx,
        snapshot_rx,
        events_tx,
        token,
        join,
    }
}

/// 徽标的对外视图
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BadgeView {
    pub phase: Phase,
    pub label: &'static str,
    pub visible: bool,
}

impl BadgeView {
    fn of(badge: &StatusBadge) -> Self {
        Self {
            phase: badge.phase(),
            label: badge.label(),
            visible: badge.visible(),
        }
    }
}

/// 徽标任务句柄
pub struct BadgeHandle {
    signals_tx: watch::Sender<BackendSignals>,
    view_rx: watch::Receiver<BadgeView>,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl BadgeHandle {
    pub fn update(&self, signals: BackendSignals) -> RevealResult<()> {
        if self.token.is_cancelled() {
            return Err(RevealError::SchedulerClosed);
        }
        self.signals_tx
            .send(signals)
            .map_err(|_| RevealError::SchedulerClosed)
    }

    pub fn view(&self) -> BadgeView {
        *self.view_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BadgeView> {
        self.view_rx.clone()
    }

    pub fn unmount(&self) {
        self.token.cancel();
    }

    pub async fn closed(self) {
        if let Err(e) = self.join.await {
            tracing::warn!("Badge loop ended abnormally: {}", e);
        }
    }
}

/// 启动状态徽标的帧循环
pub fn spawn_badge(mut badge: StatusBadge, frame: Duration, token: CancellationToken) -> BadgeHandle {
    let (signals_tx, mut signals_rx) = watch::channel(BackendSignals::default());
    let (view_tx, view_rx) = watch::channel(BadgeView::of(&badge));

    let loop_token = token.clone();
    let join = tokio::spawn(async move {
        run_frames(frame, loop_token, |now| {
            if signals_rx.has_changed().unwrap_or(false) {
                let signals = *signals_rx.borrow_and_update();
                badge.update(&signals);
            }
            badge.tick(now);
            view_tx.send_if_modified(|current| {
                let next = BadgeView::of(&badge);
                let changed = *current != next;
                *current = next;
                changed
            });
        })
        .await;
    });

    BadgeHandle {
        signals_tx,
        view_rx,
        token,
        join,
    }
}
