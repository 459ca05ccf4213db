//! 调用点守卫
//!
//! 响应不携带请求标识，晚到的旧响应会覆盖新响应，因此每个调用点同时只允许一个请求。
//! 票据在析构时释放调用点，丢弃未完成的任务即视为取消。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// 单个调用点（如“分析病例”按钮、“智能检索”按钮）
#[derive(Debug)]
pub struct CallSite {
    name: &'static str,
    busy: AtomicBool,
}

impl CallSite {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            busy: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 是否有未完成的请求（界面据此禁用触发按钮并显示加载状态）
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 尝试占用调用点，已有请求未完成时返回 `None`
    pub fn try_begin(self: &Arc<Self>) -> Option<CallTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                debug!("Call site {} acquired", self.name);
                CallTicket { site: Arc::clone(self) }
            })
    }
}

/// 调用点占用票据
#[derive(Debug)]
pub struct CallTicket {
    site: Arc<CallSite>,
}

impl CallTicket {
    pub fn site(&self) -> &CallSite {
        &self.site
    }
}

impl Drop for CallTicket {
    fn drop(&mut self) {
        self.site.busy.store(false, Ordering::Release);
        debug!("Call site {} released", self.site.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_outstanding_call() {
        let site = CallSite::new("semantic_search");
        assert!(!site.is_busy());

        let ticket = site.try_begin().expect("first call should start");
        assert!(site.is_busy());
        assert!(site.try_begin().is_none());

        drop(ticket);
        assert!(!site.is_busy());
        assert!(site.try_begin().is_some());
    }

    #[tokio::test]
    async fn test_ticket_released_when_task_aborted() {
        let site = CallSite::new("analyze_case");
        let ticket = site.try_begin().unwrap();

        let handle = tokio::spawn(async move {
            let _ticket = ticket;
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        handle.abort();
        let _ = handle.await;

        assert!(!site.is_busy());
    }
}
