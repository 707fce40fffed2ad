//! 域名记录获取

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::dns_resolver::{DnsQuery, DnsRecord, QueryType};
use crate::error::{QueryFailure, ReconError};
use crate::srv::SrvSpec;

/// 单个记录类型的查询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum RecordSet {
    /// 非空，保持应答顺序
    Found(Vec<DnsRecord>),
    /// 没有该类型的记录
    Empty,
    /// 查询失败，结果不确定
    Failed(QueryFailure),
}

impl RecordSet {
    /// 找到的记录，其它情况为空
    pub fn records(&self) -> &[DnsRecord] {
        match self {
            RecordSet::Found(records) => records,
            _ => &[],
        }
    }
}

/// 一个域名的全部记录
#[derive(Debug, Clone, Serialize)]
pub struct RecordTable {
    /// 查询的域名
    pub domain: String,
    /// 按查询顺序排列
    pub sets: Vec<(QueryType, RecordSet)>,
}

impl RecordTable {
    /// 某个类型的结果
    pub fn get(&self, query_type: QueryType) -> Option<&RecordSet> {
        self.sets
            .iter()
            .find(|(kind, _)| *kind == query_type)
            .map(|(_, set)| set)
    }
}

/// 记录获取器
pub struct RecordFetcher {
    resolver: Arc<dyn DnsQuery>,
}

impl RecordFetcher {
    /// 使用给定的DNS协作者
    pub fn new(resolver: Arc<dyn DnsQuery>) -> Self {
        RecordFetcher { resolver }
    }

    /// 依次查询 A/NS/MX/AAAA/TXT
    ///
    /// NXDOMAIN 会直接结束整个查询并返回 [`ReconError::DomainNotFound`]；
    /// 其它失败只影响对应的记录类型。
    pub async fn fetch_records(&self, domain: &str) -> Result<RecordTable, ReconError> {
        let mut sets = Vec::with_capacity(QueryType::DOMAIN_DUMP.len());

        for query_type in QueryType::DOMAIN_DUMP {
            match self.fetch_one(domain, query_type).await {
                Some(set) => sets.push((query_type, set)),
                None => return Err(ReconError::DomainNotFound(domain.to_string())),
            }
        }

        Ok(RecordTable {
            domain: domain.to_string(),
            sets,
        })
    }

    /// 查询SRV记录
    pub async fn fetch_srv(&self, spec: &SrvSpec) -> Result<RecordSet, ReconError> {
        let name = spec.query_name();
        match self.fetch_one(&name, QueryType::SRV).await {
            Some(set) => Ok(set),
            None => Err(ReconError::DomainNotFound(name)),
        }
    }

    // None 表示域名不存在
    async fn fetch_one(&self, name: &str, query_type: QueryType) -> Option<RecordSet> {
        match self.resolver.query(name, query_type).await {
            Ok(records) if records.is_empty() => Some(RecordSet::Empty),
            Ok(records) => Some(RecordSet::Found(records)),
            Err(QueryFailure::NxDomain) => {
                debug!("{} 不存在，停止查询", name);
                None
            }
            Err(QueryFailure::NoAnswer) => Some(RecordSet::Empty),
            Err(failure) => {
                warn!("{} {} 查询失败: {}", name, query_type, failure);
                Some(RecordSet::Failed(failure))
            }
        }
    }
}
