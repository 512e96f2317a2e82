//! 关闭与卸载信号
//!
//! 一次回答（turn）拥有一个 ShutdownManager；其下每个帧循环（两个揭示实例、一个徽标）
//! 持有子 token。宿主卸载或用户退出时取消根 token，所有帧循环在下一次 select 时退出，
//! 不会再修改已退役实例的状态。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// 关闭信号管理器
#[derive(Clone, Debug)]
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
}

/// 关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户退出（Ctrl+Q / Esc）
    UserInitiated,
    /// Ctrl+C 或 SIGTERM
    Signal,
    /// 所属界面作用域卸载（本轮回答结束）
    Unmounted,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown_token: CancellationToken::new(),
        }
    }

    /// 为单个帧循环创建子 token：可单独取消，也随根 token 一起取消
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown_token.child_token()
    }

    /// 取消根 token；只有第一次调用会记录原因
    pub fn shutdown(&self, reason: ShutdownReason) {
        if !self.is_shutdown() {
            tracing::info!(?reason, "Shutting down reveal loops");
        }
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::Signal);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_manager_new() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown());
    }

    #[test]
    fn test_child_token_follows_root() {
        let manager = ShutdownManager::new();
        let child = manager.child_token();
        let sibling = manager.child_token();
        sibling.cancel();
        assert!(!child.is_cancelled());
        assert!(!manager.is_shutdown());

        manager.shutdown(ShutdownReason::Unmounted);
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_repeated_shutdown_is_harmless() {
        let manager = ShutdownManager::new();
        let token = manager.child_token();
        manager.shutdown(ShutdownReason::UserInitiated);
        manager.shutdown(ShutdownReason::Unmounted);
        assert!(token.is_cancelled());
        assert!(manager.is_shutdown());
    }
}
