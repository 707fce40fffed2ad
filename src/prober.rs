//! 存活探测
//!
//! 两种存在性检测共用同一套 [`ExistenceTest`] 接口：
//! - [`ReachabilityTest`]：解析后发送回显探测，对应 `[YES]` / `[NO]`
//! - [`ResolvabilityTest`]：只做DNS解析，对应 `[FOUND]` / `[NOT FOUND]`
//!
//! 两者语义不同，同一个目标完全可能一个成功一个失败（例如屏蔽ICMP的主机）。

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;

use crate::candidates::Candidate;
use crate::dns_resolver::{DnsQuery, DnsRecord, QueryType};
use crate::echo::EchoProbe;
use crate::error::QueryFailure;

/// 检测结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// 可达或可解析
    Found,
    /// 确认不可达或不存在
    NotFound,
    /// 结果不确定，区别于确认不存在
    Error(String),
}

/// 检测类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// 解析后回显探测
    Reachability,
    /// 只做DNS解析
    Resolvability,
}

impl TestKind {
    /// 输出中的结论标签
    pub fn tag(self, outcome: &Outcome) -> String {
        match (self, outcome) {
            (TestKind::Reachability, Outcome::Found) => "YES".to_string(),
            (TestKind::Reachability, Outcome::NotFound) => "NO".to_string(),
            (TestKind::Resolvability, Outcome::Found) => "FOUND".to_string(),
            (TestKind::Resolvability, Outcome::NotFound) => "NOT FOUND".to_string(),
            (_, Outcome::Error(reason)) => format!("ERROR: {}", reason),
        }
    }
}

/// 单个候选的检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// 完整域名
    pub target: String,
    /// 结论
    pub outcome: Outcome,
    /// 解析到的地址
    pub addresses: Vec<IpAddr>,
    /// 地址全部落在泛解析地址集合内
    pub wildcard: bool,
}

impl Verdict {
    /// 没有地址信息的结果
    pub fn new(target: &str, outcome: Outcome) -> Self {
        Verdict {
            target: target.to_string(),
            outcome,
            addresses: Vec::new(),
            wildcard: false,
        }
    }

    /// 结论是否为 [`Outcome::Found`]
    pub fn is_found(&self) -> bool {
        self.outcome == Outcome::Found
    }
}

/// 存在性检测能力
#[async_trait]
pub trait ExistenceTest: Send + Sync {
    /// 检测类型，决定输出标签和超时结论
    fn kind(&self) -> TestKind;

    /// 单个探测的总超时
    fn timeout(&self) -> Duration;

    /// 对完整域名做一次检测
    async fn check(&self, target: &str) -> Verdict;

    /// 超时时的结论
    fn timed_out(&self) -> Outcome {
        match self.kind() {
            TestKind::Reachability => Outcome::NotFound,
            TestKind::Resolvability => Outcome::Error("timeout".to_string()),
        }
    }
}

/// 检测一个候选，任何失败都收敛为 [`Verdict`]，不会中断整体流程
pub async fn probe(candidate: &Candidate, test: &dyn ExistenceTest, timeout: Duration) -> Verdict {
    match tokio::time::timeout(timeout, test.check(candidate.target())).await {
        Ok(verdict) => verdict,
        Err(_) => {
            debug!("{} 探测超时", candidate.target());
            Verdict::new(candidate.target(), test.timed_out())
        }
    }
}

/// 解析A记录，没有再解析AAAA
pub async fn resolve_addresses(resolver: &dyn DnsQuery, name: &str) -> Result<Vec<IpAddr>, QueryFailure> {
    let v4 = resolver.query(name, QueryType::A).await;
    match &v4 {
        Ok(records) if has_address(records) => return Ok(addresses_of(records)),
        Err(QueryFailure::NxDomain) => return Err(QueryFailure::NxDomain),
        _ => {}
    }

    let v6 = resolver.query(name, QueryType::AAAA).await;
    if let Ok(records) = &v6 {
        if has_address(records) {
            return Ok(addresses_of(records));
        }
    }

    // 两次都没有地址：优先报告不确定的失败
    match (v4, v6) {
        (Err(failure), _) if !failure.is_absence() => Err(failure),
        (_, Err(failure)) if !failure.is_absence() => Err(failure),
        (_, Err(QueryFailure::NxDomain)) => Err(QueryFailure::NxDomain),
        _ => Err(QueryFailure::NoAnswer),
    }
}

fn has_address(records: &[DnsRecord]) -> bool {
    records.iter().any(|record| record.address().is_some())
}

fn addresses_of(records: &[DnsRecord]) -> Vec<IpAddr> {
    records.iter().filter_map(DnsRecord::address).collect()
}

/// 连通性检测：解析 + 回显
pub struct ReachabilityTest {
    resolver: Arc<dyn DnsQuery>,
    echo: Arc<dyn EchoProbe>,
    ping_timeout: Duration,
    resolve_timeout: Duration,
}

impl ReachabilityTest {
    /// `resolve_timeout` 是解析A和AAAA的总时间上限
    pub fn new(
        resolver: Arc<dyn DnsQuery>,
        echo: Arc<dyn EchoProbe>,
        ping_timeout: Duration,
        resolve_timeout: Duration,
    ) -> Self {
        ReachabilityTest {
            resolver,
            echo,
            ping_timeout,
            resolve_timeout,
        }
    }
}

#[async_trait]
impl ExistenceTest for ReachabilityTest {
    fn kind(&self) -> TestKind {
        TestKind::Reachability
    }

    fn timeout(&self) -> Duration {
        self.resolve_timeout + self.ping_timeout
    }

    async fn check(&self, target: &str) -> Verdict {
        // 和ping一样，无法解析即视为不可达
        let addresses = match resolve_addresses(self.resolver.as_ref(), target).await {
            Ok(addresses) => addresses,
            Err(failure) => {
                debug!("{} 解析失败: {}", target, failure);
                return Verdict::new(target, Outcome::NotFound);
            }
        };

        let Some(addr) = addresses
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addresses.first())
            .copied()
        else {
            return Verdict::new(target, Outcome::NotFound);
        };

        let outcome = match self.echo.ping(addr, self.ping_timeout).await {
            Ok(true) => Outcome::Found,
            Ok(false) => Outcome::NotFound,
            Err(e) => {
                debug!("{} ({}) 探测出错: {}", target, addr, e);
                Outcome::NotFound
            }
        };

        Verdict {
            target: target.to_string(),
            outcome,
            addresses,
            wildcard: false,
        }
    }
}

/// 可解析性检测
pub struct ResolvabilityTest {
    resolver: Arc<dyn DnsQuery>,
    timeout: Duration,
    wildcard: HashSet<IpAddr>,
}

impl ResolvabilityTest {
    /// `timeout` 为单个候选的解析时间上限
    pub fn new(resolver: Arc<dyn DnsQuery>, timeout: Duration) -> Self {
        ResolvabilityTest {
            resolver,
            timeout,
            wildcard: HashSet::new(),
        }
    }

    /// 命中这些地址的结果会被标记为泛解析
    pub fn with_wildcard<I: IntoIterator<Item = IpAddr>>(mut self, addresses: I) -> Self {
        self.wildcard = addresses.into_iter().collect();
        self
    }
}

#[async_trait]
impl ExistenceTest for ResolvabilityTest {
    fn kind(&self) -> TestKind {
        TestKind::Resolvability
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check(&self, target: &str) -> Verdict {
        match resolve_addresses(self.resolver.as_ref(), target).await {
            Ok(addresses) => {
                let wildcard = !self.wildcard.is_empty()
                    && addresses.iter().all(|addr| self.wildcard.contains(addr));
                Verdict {
                    target: target.to_string(),
                    outcome: Outcome::Found,
                    addresses,
                    wildcard,
                }
            }
            Err(failure) if failure.is_absence() => Verdict::new(target, Outcome::NotFound),
            Err(failure) => Verdict::new(target, Outcome::Error(failure.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubEcho, StubResolver};
    use std::net::{Ipv4Addr, Ipv6Addr};

    const WWW: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

    fn reachability(resolver: Arc<StubResolver>, echo: Arc<StubEcho>) -> ReachabilityTest {
        ReachabilityTest::new(resolver, echo, Duration::from_millis(200), Duration::from_millis(200))
    }

    async fn outcome_of(test: &dyn ExistenceTest, label: &str) -> Outcome {
        let candidate = Candidate::new(label, "example.com");
        probe(&candidate, test, test.timeout()).await.outcome
    }

    #[tokio::test]
    async fn reachability_and_resolvability_are_not_conflated() {
        // 解析成功但屏蔽ICMP
        let resolver = Arc::new(StubResolver::new().with_a("www.example.com", WWW));
        let echo = Arc::new(StubEcho::new(&[]));
        let candidate = Candidate::new("www", "example.com");

        let reach = reachability(resolver.clone(), echo.clone());
        let resolve = ResolvabilityTest::new(resolver, Duration::from_millis(200));

        let reach_verdict = probe(&candidate, &reach, reach.timeout()).await;
        let resolve_verdict = probe(&candidate, &resolve, resolve.timeout()).await;

        assert_eq!(reach_verdict.outcome, Outcome::NotFound);
        assert_eq!(resolve_verdict.outcome, Outcome::Found);
        assert_eq!(TestKind::Reachability.tag(&reach_verdict.outcome), "NO");
        assert_eq!(TestKind::Resolvability.tag(&resolve_verdict.outcome), "FOUND");
        assert_eq!(echo.calls(), 1);
    }

    #[tokio::test]
    async fn reachable_host_is_found() {
        let resolver = Arc::new(StubResolver::new().with_a("www.example.com", WWW));
        let echo = Arc::new(StubEcho::new(&[IpAddr::V4(WWW)]));
        let test = reachability(resolver, echo);

        let verdict = probe(&Candidate::new("www", "example.com"), &test, test.timeout()).await;
        assert_eq!(verdict.outcome, Outcome::Found);
        assert_eq!(verdict.addresses, vec![IpAddr::V4(WWW)]);
    }

    #[tokio::test]
    async fn unresolvable_candidate_is_unreachable_not_error() {
        let resolver = Arc::new(
            StubResolver::new().with_answer("dead.example.com", QueryType::A, Err(QueryFailure::Timeout)),
        );
        let echo = Arc::new(StubEcho::new(&[]));
        let test = reachability(resolver, echo.clone());

        let missing = probe(&Candidate::new("nope", "example.com"), &test, test.timeout()).await;
        let dead = probe(&Candidate::new("dead", "example.com"), &test, test.timeout()).await;
        assert_eq!(missing.outcome, Outcome::NotFound);
        assert_eq!(dead.outcome, Outcome::NotFound);
        assert_eq!(echo.calls(), 0);
    }

    #[tokio::test]
    async fn ipv6_only_host_is_pinged_on_its_v6_address() {
        let v6: Ipv6Addr = "2001:db8::10".parse().unwrap();
        let resolver = Arc::new(StubResolver::new().with_answer(
            "v6.example.com",
            QueryType::AAAA,
            Ok(vec![DnsRecord::AAAA(v6)]),
        ));
        let echo = Arc::new(StubEcho::new(&[IpAddr::V6(v6)]));
        let test = reachability(resolver, echo);

        let verdict = probe(&Candidate::new("v6", "example.com"), &test, test.timeout()).await;
        assert_eq!(verdict.outcome, Outcome::Found);
    }

    #[tokio::test]
    async fn resolvability_separates_absence_from_inconclusive() {
        let resolver = Arc::new(
            StubResolver::new()
                .with_answer("slow.example.com", QueryType::A, Err(QueryFailure::Timeout))
                .with_answer("broken.example.com", QueryType::A, Err(QueryFailure::NoNameservers))
                .with_answer("mx-only.example.com", QueryType::MX, Ok(vec![])),
        );
        let test = ResolvabilityTest::new(resolver, Duration::from_millis(200));

        assert_eq!(outcome_of(&test, "nothing").await, Outcome::NotFound);
        assert_eq!(outcome_of(&test, "mx-only").await, Outcome::NotFound);
        assert_eq!(
            outcome_of(&test, "slow").await,
            Outcome::Error("query timed out".to_string())
        );
        assert_eq!(
            outcome_of(&test, "broken").await,
            Outcome::Error("no nameservers available".to_string())
        );
    }

    #[tokio::test]
    async fn probe_timeout_depends_on_test_kind() {
        let resolver = Arc::new(
            StubResolver::new()
                .with_a("hang.example.com", WWW)
                .with_delay("hang.example.com", Duration::from_secs(30)),
        );
        let echo = Arc::new(StubEcho::new(&[IpAddr::V4(WWW)]));
        let candidate = Candidate::new("hang", "example.com");
        let limit = Duration::from_millis(50);

        let reach = reachability(resolver.clone(), echo);
        let resolve = ResolvabilityTest::new(resolver, limit);

        assert_eq!(probe(&candidate, &reach, limit).await.outcome, Outcome::NotFound);
        assert_eq!(
            probe(&candidate, &resolve, limit).await.outcome,
            Outcome::Error("timeout".to_string())
        );
    }

    #[tokio::test]
    async fn silent_host_is_unreachable_after_timeout() {
        // 解析成功，但回显一直没有返回
        let resolver = Arc::new(StubResolver::new().with_a("www.example.com", WWW));
        let echo = Arc::new(StubEcho::new(&[IpAddr::V4(WWW)]).with_delay(Duration::from_secs(30)));
        let test = ReachabilityTest::new(
            resolver,
            echo.clone(),
            Duration::from_millis(50),
            Duration::from_millis(50),
        );

        let verdict = probe(&Candidate::new("www", "example.com"), &test, test.timeout()).await;
        assert_eq!(verdict.outcome, Outcome::NotFound);
        assert_eq!(TestKind::Reachability.tag(&verdict.outcome), "NO");
        assert_eq!(echo.calls(), 1);
    }

    #[tokio::test]
    async fn wildcard_addresses_are_flagged() {
        let wildcard_ip = Ipv4Addr::new(198, 51, 100, 7);
        let resolver = Arc::new(
            StubResolver::new()
                .with_wildcard("example.com", wildcard_ip)
                .with_a("www.example.com", WWW),
        );
        let test = ResolvabilityTest::new(resolver, Duration::from_millis(200))
            .with_wildcard([IpAddr::V4(wildcard_ip)]);

        let anything = test.check("qwerty.example.com").await;
        let www = test.check("www.example.com").await;
        assert!(anything.is_found() && anything.wildcard);
        assert!(www.is_found() && !www.wildcard);
    }
}
