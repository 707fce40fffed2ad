//! 对外的高层API：配置和侦察引擎

use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::sync::OnceCell;

use crate::candidates::load_labels;
use crate::dns_resolver::{DnsQuery, DnsResolver, ResolverSettings};
use crate::echo::{echo_for, EchoProbe, PingMethod};
use crate::engine::{DiscoveryEngine, DiscoveryReport, DEFAULT_CONCURRENCY};
use crate::error::ReconError;
use crate::prober::{ExistenceTest, ReachabilityTest, ResolvabilityTest, Verdict};
use crate::records::{RecordFetcher, RecordSet, RecordTable};
use crate::reverse;
use crate::srv::SrvSpec;
use crate::wildcard::WildcardDetector;

/// 侦察配置
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// DNS服务器列表，为空时使用系统配置
    pub resolvers: Vec<IpAddr>,
    /// 并发探测数
    pub concurrency: usize,
    /// 单次回显探测超时
    pub ping_timeout: Duration,
    /// 单次DNS查询超时
    pub dns_timeout: Duration,
    /// DNS查询尝试次数，1表示不重试
    pub dns_attempts: usize,
    /// 连通性检测使用的回显方式
    pub ping_method: PingMethod,
    /// TCP连接探测使用的端口
    pub tcp_ports: Vec<u16>,
    /// 暴破前是否检测泛解析
    pub detect_wildcard: bool,
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            resolvers: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            ping_timeout: Duration::from_secs(2),
            dns_timeout: Duration::from_secs(5),
            dns_attempts: 1,
            ping_method: PingMethod::Auto,
            tcp_ports: vec![80, 443],
            detect_wildcard: true,
        }
    }
}

impl ReconConfig {
    fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            nameservers: self.resolvers.clone(),
            timeout: self.dns_timeout,
            attempts: self.dns_attempts,
        }
    }
}

/// 侦察引擎，组合记录获取、存活探测和反向查询
pub struct ReconEngine {
    config: ReconConfig,
    resolver: Arc<dyn DnsQuery>,
    // 第一次连通性检测时才选择，反查和暴破不需要原始套接字
    echo: OnceCell<Arc<dyn EchoProbe>>,
    fetcher: RecordFetcher,
    discovery: DiscoveryEngine,
}

impl ReconEngine {
    /// 使用trust-dns解析器，回显探测器在第一次连通性检测时按配置选择
    pub fn new(config: ReconConfig) -> Self {
        let resolver: Arc<dyn DnsQuery> = Arc::new(DnsResolver::new(&config.resolver_settings()));
        Self::with_resolver(config, resolver, OnceCell::new())
    }

    /// 注入自定义的DNS和回显协作者
    pub fn with_collaborators(
        config: ReconConfig,
        resolver: Arc<dyn DnsQuery>,
        echo: Arc<dyn EchoProbe>,
    ) -> Self {
        Self::with_resolver(config, resolver, OnceCell::new_with(Some(echo)))
    }

    fn with_resolver(
        config: ReconConfig,
        resolver: Arc<dyn DnsQuery>,
        echo: OnceCell<Arc<dyn EchoProbe>>,
    ) -> Self {
        let fetcher = RecordFetcher::new(Arc::clone(&resolver));
        let discovery = DiscoveryEngine::new(config.concurrency);
        ReconEngine {
            config,
            resolver,
            echo,
            fetcher,
            discovery,
        }
    }

    /// 当前配置
    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    /// 共享的发现引擎
    pub fn discovery(&self) -> &DiscoveryEngine {
        &self.discovery
    }

    /// 取消正在进行的发现
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.discovery.stop_handle()
    }

    /// 查询域名的 A/NS/MX/AAAA/TXT 记录
    pub async fn fetch_records(&self, domain: &str) -> Result<RecordTable, ReconError> {
        self.fetcher.fetch_records(domain).await
    }

    /// 查询SRV记录
    pub async fn srv_records(&self, spec: &SrvSpec) -> Result<RecordSet, ReconError> {
        self.fetcher.fetch_srv(spec).await
    }

    /// 解析 `service:protocol:domain` 后查询SRV记录，格式错误时不发起查询
    pub async fn srv_lookup(&self, raw: &str) -> Result<(SrvSpec, RecordSet), ReconError> {
        let spec: SrvSpec = raw.parse()?;
        let set = self.srv_records(&spec).await?;
        Ok((spec, set))
    }

    /// PTR反向查询
    pub async fn reverse_lookup(&self, ip: IpAddr) -> Result<Vec<String>, ReconError> {
        reverse::reverse_lookup(self.resolver.as_ref(), ip).await
    }

    // 解析地址最多查询A和AAAA两次
    fn query_budget(&self) -> Duration {
        DnsResolver::query_budget(&self.config.resolver_settings()) * 2
    }

    async fn echo(&self) -> Result<Arc<dyn EchoProbe>, ReconError> {
        self.echo
            .get_or_try_init(|| async {
                echo_for(self.config.ping_method, &self.config.tcp_ports)
                    .map_err(|e| ReconError::Setup(format!("cannot open ICMP socket: {}", e)))
            })
            .await
            .map(Arc::clone)
    }

    /// 连通性检测，`--ping-method icmp` 且没有原始套接字权限时返回 [`ReconError::Setup`]
    pub async fn reachability_test(&self) -> Result<Arc<dyn ExistenceTest>, ReconError> {
        Ok(Arc::new(ReachabilityTest::new(
            Arc::clone(&self.resolver),
            self.echo().await?,
            self.config.ping_timeout,
            self.query_budget(),
        )))
    }

    /// 可解析性检测，命中 `wildcard` 地址的结果会被标记
    pub fn resolvability_test(&self, wildcard: &[IpAddr]) -> Arc<dyn ExistenceTest> {
        Arc::new(
            ResolvabilityTest::new(Arc::clone(&self.resolver), self.query_budget())
                .with_wildcard(wildcard.iter().copied()),
        )
    }

    /// 子域名列表连通性检测
    pub async fn check_subdomains<F>(
        &self,
        domain: &str,
        path: &Path,
        on_verdict: F,
    ) -> Result<DiscoveryReport, ReconError>
    where
        F: FnMut(&Verdict),
    {
        let labels = load_labels(path)?;
        info!("{} 读取 {} 个子域名", path.display(), labels.len());
        let test = self.reachability_test().await?;
        Ok(self
            .discovery
            .discover_with(domain, &labels, test, on_verdict)
            .await)
    }

    /// 字典暴破
    pub async fn brute_force<F>(
        &self,
        domain: &str,
        path: &Path,
        on_verdict: F,
    ) -> Result<DiscoveryReport, ReconError>
    where
        F: FnMut(&Verdict),
    {
        let labels = load_labels(path)?;
        info!("{} 读取 {} 个字典条目", path.display(), labels.len());
        Ok(self.brute_force_labels(domain, &labels, on_verdict).await)
    }

    /// 对内存中的字典暴破
    pub async fn brute_force_labels<F>(
        &self,
        domain: &str,
        labels: &[String],
        on_verdict: F,
    ) -> DiscoveryReport
    where
        F: FnMut(&Verdict),
    {
        let wildcard = if self.config.detect_wildcard {
            WildcardDetector::new(Arc::clone(&self.resolver))
                .detect(domain)
                .await
        } else {
            None
        };

        let test = self.resolvability_test(wildcard.as_deref().unwrap_or_default());
        let mut report = self
            .discovery
            .discover_with(domain, labels, test, on_verdict)
            .await;
        report.wildcard = wildcard;
        report
    }
}

/// 便捷函数：字典暴破
pub async fn brute_force_subdomains(
    domain: &str,
    wordlist: &Path,
    config: Option<ReconConfig>,
) -> Result<DiscoveryReport, ReconError> {
    let engine = ReconEngine::new(config.unwrap_or_default());
    engine.brute_force(domain, wordlist, |_| {}).await
}

/// 便捷函数：子域名连通性检测
pub async fn check_subdomains(
    domain: &str,
    subdomains: &Path,
    config: Option<ReconConfig>,
) -> Result<DiscoveryReport, ReconError> {
    let engine = ReconEngine::new(config.unwrap_or_default());
    engine.check_subdomains(domain, subdomains, |_| {}).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubEcho, StubResolver};

    fn stub_engine(resolver: Arc<StubResolver>) -> ReconEngine {
        ReconEngine::with_collaborators(ReconConfig::default(), resolver, Arc::new(StubEcho::new(&[])))
    }

    #[tokio::test]
    async fn malformed_srv_argument_sends_no_query() {
        let resolver = Arc::new(StubResolver::new());
        let engine = stub_engine(resolver.clone());

        for raw in ["ldap:tcp", "ldap:tcp:example.com:extra", "::"] {
            assert!(matches!(
                engine.srv_lookup(raw).await,
                Err(ReconError::MalformedSrvSpec(_))
            ));
        }
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn srv_lookup_queries_composed_name() {
        let resolver = Arc::new(StubResolver::new());
        let engine = stub_engine(resolver.clone());

        let result = engine.srv_lookup("sip:udp:example.com").await;
        assert!(matches!(result, Err(ReconError::DomainNotFound(name)) if name == "_sip._udp.example.com"));
        assert_eq!(
            resolver.queried(),
            vec![("_sip._udp.example.com".to_string(), crate::dns_resolver::QueryType::SRV)]
        );
    }

    #[tokio::test]
    async fn icmp_only_is_required_by_reachability() {
        // 没有原始套接字权限时也能构造，反查不受影响
        let config = ReconConfig {
            ping_method: PingMethod::Icmp,
            ..Default::default()
        };
        let engine = ReconEngine::new(config);
        assert!(engine.echo.get().is_none());

        let missing = Path::new("/nonexistent/rdnsrecon/list.txt");
        let result = engine.check_subdomains("example.com", missing, |_| {}).await;
        assert!(matches!(result, Err(ReconError::CandidateSourceUnreadable { .. })));
        assert!(engine.echo.get().is_none());
    }

    #[tokio::test]
    async fn injected_echo_is_used_as_is() {
        let engine = stub_engine(Arc::new(StubResolver::new()));
        let echo = engine.echo().await.unwrap();
        assert_eq!(echo.method(), PingMethod::TcpConnect);
        assert_eq!(engine.reachability_test().await.unwrap().kind(), crate::prober::TestKind::Reachability);
    }
}
