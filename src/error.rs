//! 错误类型

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// 单次DNS查询的失败分类
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum QueryFailure {
    /// NXDOMAIN，域名不存在
    #[error("domain does not exist")]
    NxDomain,
    /// 域名存在但没有该类型的记录
    #[error("no records of this type")]
    NoAnswer,
    /// 超时
    #[error("query timed out")]
    Timeout,
    /// 没有可用的DNS服务器
    #[error("no nameservers available")]
    NoNameservers,
    /// 其它失败，例如SERVFAIL或REFUSED
    #[error("{0}")]
    Other(String),
}

impl QueryFailure {
    /// 是否表示"确认不存在"，而不是结果不确定
    pub fn is_absence(&self) -> bool {
        matches!(self, QueryFailure::NxDomain | QueryFailure::NoAnswer)
    }
}

/// 操作级别的错误
#[derive(Debug, Error)]
pub enum ReconError {
    /// 记录查询时域名不存在
    #[error("domain {0} does not exist")]
    DomainNotFound(String),

    /// 候选列表文件无法读取
    #[error("candidate source {} unreadable: {source}", path.display())]
    CandidateSourceUnreadable {
        /// 文件路径
        path: PathBuf,
        /// 底层IO错误
        #[source]
        source: io::Error,
    },

    /// 候选列表中有非法条目
    #[error("candidate source {} line {line}: malformed entry {entry:?}", path.display())]
    CandidateSourceMalformed {
        /// 文件路径
        path: PathBuf,
        /// 出错的行号，从1开始
        line: usize,
        /// 出错的内容
        entry: String,
    },

    /// `--srv` 参数格式错误
    #[error("SRV record argument must be in the format 'service:protocol:domain', got {0:?}")]
    MalformedSrvSpec(String),

    /// 没有PTR记录
    #[error("no reverse DNS entry found for {0}")]
    ReverseLookupNotFound(IpAddr),

    /// 无法归类为"不存在"的查询失败
    #[error(transparent)]
    Query(#[from] QueryFailure),

    /// 初始化失败，例如无法打开ICMP套接字
    #[error("setup failed: {0}")]
    Setup(String),
}

impl ReconError {
    /// 候选列表读取失败属于致命错误，需要非零退出码
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconError::CandidateSourceUnreadable { .. }
                | ReconError::CandidateSourceMalformed { .. }
                | ReconError::Setup(_)
        )
    }
}
