//! 子域名发现引擎
//!
//! 子域名列表检测和字典暴破共用这一个引擎，区别只在注入的 [`ExistenceTest`]。
//! 探测并发执行，但报告始终按输入顺序输出。

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::candidates::{build_candidates, Candidate};
use crate::prober::{probe, ExistenceTest, Outcome, TestKind, Verdict};

/// 默认并发数
pub const DEFAULT_CONCURRENCY: usize = 32;

/// 一次发现的完整报告
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    /// 基础域名
    pub domain: String,
    /// 使用的检测类型
    pub kind: TestKind,
    /// 与输入顺序一致
    pub verdicts: Vec<Verdict>,
    /// 输入的候选数量
    pub total: usize,
    /// 被取消，只包含部分结果
    pub partial: bool,
    /// 检测到的泛解析地址
    pub wildcard: Option<Vec<IpAddr>>,
    /// 报告生成时间
    pub generated_at: DateTime<Utc>,
}

impl DiscoveryReport {
    /// 检测成功的结果
    pub fn found(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|verdict| verdict.is_found())
    }

    /// 结果不确定的数量
    pub fn errors(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|verdict| matches!(verdict.outcome, Outcome::Error(_)))
            .count()
    }
}

/// 有界并发的发现引擎
pub struct DiscoveryEngine {
    concurrency: usize,
    running: Arc<AtomicBool>,
}

impl DiscoveryEngine {
    /// `concurrency` 为同时进行的探测数，最小为1
    pub fn new(concurrency: usize) -> Self {
        DiscoveryEngine {
            concurrency: concurrency.max(1),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// 并发数
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 共享的运行标志，置为 `false` 后不再发起新的探测
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// 停止发起新的探测，已开始的探测会完成
    pub fn cancel(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// 是否已取消
    pub fn is_cancelled(&self) -> bool {
        !self.running.load(Ordering::Relaxed)
    }

    /// 不需要逐个回调时使用
    pub async fn discover(
        &self,
        domain: &str,
        labels: &[String],
        test: Arc<dyn ExistenceTest>,
    ) -> DiscoveryReport {
        self.discover_with(domain, labels, test, |_| {}).await
    }

    /// 执行发现，`on_verdict` 按输入顺序逐个收到结果
    pub async fn discover_with<F>(
        &self,
        domain: &str,
        labels: &[String],
        test: Arc<dyn ExistenceTest>,
        mut on_verdict: F,
    ) -> DiscoveryReport
    where
        F: FnMut(&Verdict),
    {
        let candidates = build_candidates(domain, labels);
        let total = candidates.len();
        let kind = test.kind();
        info!(
            "{:?} 检测 {} 个候选，并发 {}",
            kind, total, self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(total);
        let mut targets = Vec::with_capacity(total);

        for candidate in candidates {
            targets.push(candidate.target().to_string());
            tasks.push(self.spawn_probe(candidate, Arc::clone(&test), Arc::clone(&semaphore)));
        }

        let mut verdicts = Vec::with_capacity(total);
        let mut partial = false;

        // 按提交顺序等待，等价于按下标写入预分配的结果槽
        for (task, target) in tasks.into_iter().zip(targets) {
            let verdict = match task.await {
                Ok(Some(verdict)) => verdict,
                Ok(None) => {
                    partial = true;
                    continue;
                }
                Err(e) => {
                    warn!("{} 探测任务异常: {}", target, e);
                    Verdict::new(&target, Outcome::Error(format!("probe task failed: {}", e)))
                }
            };
            on_verdict(&verdict);
            verdicts.push(verdict);
        }

        if partial {
            warn!("检测被中断，已完成 {}/{}", verdicts.len(), total);
        }

        DiscoveryReport {
            domain: domain.to_string(),
            kind,
            verdicts,
            total,
            partial,
            wildcard: None,
            generated_at: Utc::now(),
        }
    }

    fn spawn_probe(
        &self,
        candidate: Candidate,
        test: Arc<dyn ExistenceTest>,
        semaphore: Arc<Semaphore>,
    ) -> tokio::task::JoinHandle<Option<Verdict>> {
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            if !running.load(Ordering::Relaxed) {
                debug!("已取消，跳过 {}", candidate.target());
                return None;
            }
            let timeout = test.timeout();
            Some(probe(&candidate, test.as_ref(), timeout).await)
        })
    }
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        DiscoveryEngine::new(DEFAULT_CONCURRENCY)
    }
}
