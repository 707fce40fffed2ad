//! DNS查询
//!
//! [`DnsQuery`] 是查询的抽象，生产实现 [`DnsResolver`] 基于trust-dns。

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use log::debug;
use serde::Serialize;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::proto::rr::{RData, RecordType};
use trust_dns_resolver::TokioAsyncResolver;

use crate::error::QueryFailure;

/// 支持查询的记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum QueryType {
    A,
    AAAA,
    NS,
    MX,
    TXT,
    SRV,
}

impl QueryType {
    /// 域名记录转储时依次查询的类型
    pub const DOMAIN_DUMP: [QueryType; 5] = [
        QueryType::A,
        QueryType::NS,
        QueryType::MX,
        QueryType::AAAA,
        QueryType::TXT,
    ];

    fn record_type(self) -> RecordType {
        match self {
            QueryType::A => RecordType::A,
            QueryType::AAAA => RecordType::AAAA,
            QueryType::NS => RecordType::NS,
            QueryType::MX => RecordType::MX,
            QueryType::TXT => RecordType::TXT,
            QueryType::SRV => RecordType::SRV,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// DNS记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum DnsRecord {
    /// IPv4地址
    A(Ipv4Addr),
    /// IPv6地址
    AAAA(Ipv6Addr),
    /// 权威服务器
    NS(String),
    /// 邮件交换
    MX {
        /// 优先级，越小越优先
        preference: u16,
        /// 邮件服务器
        exchange: String,
    },
    /// 多段文本拼接后的内容
    TXT(String),
    /// 服务定位
    SRV {
        /// 优先级
        priority: u16,
        /// 同优先级内的权重
        weight: u16,
        /// 端口
        port: u16,
        /// 目标主机
        target: String,
    },
    /// 反向解析得到的主机名
    PTR(String),
}

impl DnsRecord {
    /// 地址类记录对应的IP
    pub fn address(&self) -> Option<IpAddr> {
        match self {
            DnsRecord::A(ip) => Some(IpAddr::V4(*ip)),
            DnsRecord::AAAA(ip) => Some(IpAddr::V6(*ip)),
            _ => None,
        }
    }

    fn from_rdata(rdata: &RData) -> Option<Self> {
        let record = match rdata {
            RData::A(a) => DnsRecord::A(a.0),
            RData::AAAA(aaaa) => DnsRecord::AAAA(aaaa.0),
            RData::NS(ns) => DnsRecord::NS(ns.to_string()),
            RData::MX(mx) => DnsRecord::MX {
                preference: mx.preference(),
                exchange: mx.exchange().to_string(),
            },
            RData::TXT(txt) => DnsRecord::TXT(
                txt.iter()
                    .map(|bytes| String::from_utf8_lossy(bytes))
                    .join(""),
            ),
            RData::SRV(srv) => DnsRecord::SRV {
                priority: srv.priority(),
                weight: srv.weight(),
                port: srv.port(),
                target: srv.target().to_string(),
            },
            RData::PTR(ptr) => DnsRecord::PTR(ptr.to_string()),
            _ => return None,
        };
        Some(record)
    }
}

/// DNS查询协作者
///
/// 生产环境使用 [`DnsResolver`]，测试中可以替换为桩实现。
#[async_trait]
pub trait DnsQuery: Send + Sync {
    /// 查询 `name` 的 `query_type` 记录
    async fn query(&self, name: &str, query_type: QueryType) -> Result<Vec<DnsRecord>, QueryFailure>;

    /// PTR反向查询
    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, QueryFailure>;
}

/// 解析器设置
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// 自定义DNS服务器，为空时使用系统配置
    pub nameservers: Vec<IpAddr>,
    /// 单次查询超时
    pub timeout: Duration,
    /// 尝试次数，至少为1
    pub attempts: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            nameservers: Vec::new(),
            timeout: Duration::from_secs(5),
            attempts: 1,
        }
    }
}

/// 基于trust-dns的DNS解析器
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// 没有指定DNS服务器时读取系统配置，读取失败则使用默认配置
    pub fn new(settings: &ResolverSettings) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = settings.timeout;
        opts.attempts = settings.attempts.max(1);

        let resolver = if settings.nameservers.is_empty() {
            let (config, system_opts) = trust_dns_resolver::system_conf::read_system_conf()
                .unwrap_or_else(|e| {
                    debug!("读取系统DNS配置失败，使用默认配置: {}", e);
                    (ResolverConfig::default(), ResolverOpts::default())
                });
            opts.ndots = system_opts.ndots;
            TokioAsyncResolver::tokio(config, opts)
        } else {
            let group = NameServerConfigGroup::from_ips_clear(&settings.nameservers, 53, true);
            let config = ResolverConfig::from_parts(None, Vec::new(), group);
            TokioAsyncResolver::tokio(config, opts)
        };

        DnsResolver { resolver }
    }

    /// 超时时间上限：单次超时 × 尝试次数
    pub fn query_budget(settings: &ResolverSettings) -> Duration {
        settings.timeout * settings.attempts.max(1) as u32
    }
}

#[async_trait]
impl DnsQuery for DnsResolver {
    async fn query(&self, name: &str, query_type: QueryType) -> Result<Vec<DnsRecord>, QueryFailure> {
        let fqdn = absolute_name(name);
        let lookup = self
            .resolver
            .lookup(fqdn.as_str(), query_type.record_type())
            .await
            .map_err(classify)?;

        let records: Vec<DnsRecord> = lookup
            .iter()
            .filter_map(DnsRecord::from_rdata)
            .filter(|record| record_matches(record, query_type))
            .collect();
        debug!("{} {} -> {} 条记录", name, query_type, records.len());
        Ok(records)
    }

    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, QueryFailure> {
        let lookup = self.resolver.reverse_lookup(ip).await.map_err(classify)?;
        Ok(lookup.iter().map(|name| name.to_string()).collect())
    }
}

/// 以点结尾的绝对名称，避免解析器追加 resolv.conf 中的 search 后缀
pub fn absolute_name(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

// CNAME链会把中间记录一起带回来，只保留请求的类型
fn record_matches(record: &DnsRecord, query_type: QueryType) -> bool {
    matches!(
        (record, query_type),
        (DnsRecord::A(_), QueryType::A)
            | (DnsRecord::AAAA(_), QueryType::AAAA)
            | (DnsRecord::NS(_), QueryType::NS)
            | (DnsRecord::MX { .. }, QueryType::MX)
            | (DnsRecord::TXT(_), QueryType::TXT)
            | (DnsRecord::SRV { .. }, QueryType::SRV)
    )
}

/// 将trust-dns错误映射为查询失败分类
pub fn classify(err: ResolveError) -> QueryFailure {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain => QueryFailure::NxDomain,
            ResponseCode::NoError => QueryFailure::NoAnswer,
            ResponseCode::ServFail => QueryFailure::Other("server failure".to_string()),
            ResponseCode::Refused => QueryFailure::Other("query refused".to_string()),
            other => QueryFailure::Other(format!("unexpected response code {}", other)),
        },
        ResolveErrorKind::Timeout => QueryFailure::Timeout,
        ResolveErrorKind::NoConnections => QueryFailure::NoNameservers,
        _ => QueryFailure::Other(err.to_string()),
    }
}
