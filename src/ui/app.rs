//! TUI 应用主循环
//!
//! 进入全屏/原始模式；每帧把脚本到期的片段组装成权威记录，推给两个揭示实例（第 0、1 层）
//! 与状态徽标，排空事件后渲染。退出或重放时卸载当前会话的所有帧循环。

use std::io;
use std::sync::Arc;
use std::time::Instant;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::config::PacerConfig;
use crate::core::{ShutdownManager, ShutdownReason};
use crate::feed::{demo_script, FragmentAssembler, ScriptedFeed};
use crate::reveal::{HierarchicalStreamReveal, RevealEvent};
use crate::scheduler::{spawn_badge, spawn_reveal, BadgeHandle, RevealHandle};
use crate::throttle::{derive_target_phase, PhaseQueueThrottler, StatusBadge, ThrottleVariant};
use crate::ui::event::{EventHandler, UiCommand};
use crate::ui::render::{draw, DemoView};

/// 一次脚本回放：两个揭示实例 + 徽标 + 阶段列表
struct Session {
    token: CancellationToken,
    levels: [RevealHandle; 2],
    events: [broadcast::Receiver<RevealEvent>; 2],
    badge: BadgeHandle,
    steps: PhaseQueueThrottler,
    feed: ScriptedFeed,
    assembler: FragmentAssembler,
    started: Instant,
    streaming_allowed: bool,
    questions_complete: [bool; 2],
}

impl Session {
    fn start(cfg: &PacerConfig, token: CancellationToken) -> Self {
        let frame = cfg.scheduler.frame_interval();
        let now = Instant::now();
        let top = HierarchicalStreamReveal::from_config(cfg)
            .with_allow_streaming(|| tracing::info!("Last top-level sub-question revealed, answer may stream"))
            .with_on_complete(|| tracing::info!("All top-level questions revealed"));
        let nested = HierarchicalStreamReveal::from_config(cfg)
            .with_on_complete(|| tracing::debug!("All level-1 questions revealed"));
        let levels = [
            spawn_reveal(top, frame, token.child_token()),
            spawn_reveal(nested, frame, token.child_token()),
        ];
        let events = [levels[0].subscribe_events(), levels[1].subscribe_events()];
        let badge = spawn_badge(StatusBadge::from_config(cfg, now), frame, token.child_token());
        Self {
            token,
            levels,
            events,
            badge,
            steps: PhaseQueueThrottler::from_config(ThrottleVariant::List, &cfg.throttle, now),
            feed: ScriptedFeed::new(demo_script()),
            assembler: FragmentAssembler::new(),
            started: now,
            streaming_allowed: false,
            questions_complete: [false; 2],
        }
    }

    /// 推进一帧：应用到期片段并同步到各帧循环
    fn pump(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let due = self.feed.due(now.duration_since(self.started));
        if !due.is_empty() {
            for fragment in due {
                self.assembler.apply(fragment);
            }
            self.levels[0].push(self.assembler.level(0))?;
            self.levels[1].push(self.assembler.level(1))?;
            let signals = self.assembler.signals();
            self.badge.update(signals)?;
            self.steps.advance(derive_target_phase(&signals));
        }
        self.steps.tick(now);

        for (level, rx) in self.events.iter_mut().enumerate() {
            loop {
                match rx.try_recv() {
                    Ok(RevealEvent::AllowStreaming) => self.streaming_allowed = true,
                    Ok(RevealEvent::QuestionsComplete) => self.questions_complete[level] = true,
                    Ok(_) => {}
                    Err(TryRecvError::Lagged(n)) => {
                        tracing::warn!(level, skipped = n, "Reveal events lagged");
                    }
                    Err(_) => break,
                }
            }
        }
        Ok(())
    }

    fn fast_forward(&self) -> anyhow::Result<()> {
        for handle in &self.levels {
            handle.fast_forward()?;
        }
        Ok(())
    }

    /// 卸载并等待所有帧循环退出
    async fn close(self) {
        self.token.cancel();
        let [top, nested] = self.levels;
        top.closed().await;
        nested.closed().await;
        self.badge.closed().await;
    }
}

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(cfg: PacerConfig) -> anyhow::Result<()> {
    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let event_handler = EventHandler::new(cfg.scheduler.frame_interval());
    let mut session = Session::start(&cfg, shutdown.child_token());
    tracing::info!("Demo session started");

    let result: anyhow::Result<()> = async {
        while !shutdown.is_shutdown() {
            session.pump()?;
            let top = session.levels[0].snapshot();
            let nested = session.levels[1].snapshot();
            let view = DemoView {
                badge: session.badge.view(),
                steps: session.steps.displayed_phases(),
                levels: [top.as_slice(), nested.as_slice()],
                streaming_allowed: session.streaming_allowed,
                questions_complete: session.questions_complete[0] && session.questions_complete[1],
            };
            terminal.draw(|f| draw(f, &view))?;

            match event_handler.poll()? {
                Some(UiCommand::Quit) => shutdown.shutdown(ShutdownReason::UserInitiated),
                Some(UiCommand::FastForward) => session.fast_forward()?,
                Some(UiCommand::Replay) => {
                    let old = std::mem::replace(
                        &mut session,
                        Session::start(&cfg, shutdown.child_token()),
                    );
                    old.close().await;
                    tracing::info!("Demo session restarted");
                }
                None => {}
            }
        }
        Ok(())
    }
    .await;

    shutdown.shutdown(ShutdownReason::Unmounted);
    session.close().await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}
