//! 事件处理
//!
//! 轮询 crossterm 键盘事件：Ctrl+C / Ctrl+Q / Esc / q 退出，f 快进，r 重放脚本。

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// 演示宿主的用户指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Quit,
    /// 让两个揭示实例立即追平权威数据
    FastForward,
    /// 卸载当前实例并从头重放脚本
    Replay,
}

/// 事件处理器：poll 最多等待 `timeout`（即 UI 帧间隔）
pub struct EventHandler {
    timeout: Duration,
}

impl EventHandler {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn poll(&self) -> anyhow::Result<Option<UiCommand>> {
        if event::poll(self.timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(map_key(key));
                }
            }
        }
        Ok(None)
    }
}

fn map_key(key: KeyEvent) -> Option<UiCommand> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => Some(UiCommand::Quit),
        KeyCode::Esc | KeyCode::Char('q') => Some(UiCommand::Quit),
        KeyCode::Char('f') => Some(UiCommand::FastForward),
        KeyCode::Char('r') => Some(UiCommand::Replay),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        let press = |code, modifiers| KeyEvent::new(code, modifiers);
        assert_eq!(map_key(press(KeyCode::Char('q'), KeyModifiers::CONTROL)), Some(UiCommand::Quit));
        assert_eq!(map_key(press(KeyCode::Esc, KeyModifiers::NONE)), Some(UiCommand::Quit));
        assert_eq!(map_key(press(KeyCode::Char('f'), KeyModifiers::NONE)), Some(UiCommand::FastForward));
        assert_eq!(map_key(press(KeyCode::Char('x'), KeyModifiers::NONE)), None);
    }
}
