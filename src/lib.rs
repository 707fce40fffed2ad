//! # rdnsrecon
//!
//! 域名侦察工具库：DNS记录查询、子域名存活检测和字典暴破。
//!
//! ## 特性
//!
//! - **记录查询**: A/NS/MX/AAAA/TXT 以及 SRV，失败按类型分类
//! - **存活检测**: ICMP echo（无权限时自动改用TCP连接探测）
//! - **字典暴破**: 基于DNS解析，带泛解析检测
//! - **有界并发**: 结果始终按输入顺序输出，支持中途取消
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use std::path::Path;
//! use rdnsrecon::{ReconConfig, ReconEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ReconEngine::new(ReconConfig::default());
//!
//!     let table = engine.fetch_records("example.com").await?;
//!     println!("{} 种记录", table.sets.len());
//!
//!     let report = engine
//!         .brute_force("example.com", Path::new("words.txt"), |verdict| {
//!             println!("{} {:?}", verdict.target, verdict.outcome);
//!         })
//!         .await?;
//!     println!("发现 {} 个子域名", report.found().count());
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub mod api;
pub mod candidates;
pub mod dns_resolver;
pub mod echo;
pub mod engine;
pub mod error;
pub mod input;
pub mod logger;
pub mod output;
pub mod prober;
pub mod records;
pub mod reverse;
pub mod srv;
pub mod wildcard;

#[cfg(test)]
mod test_support;

// 重新导出主要的公共API
pub use api::{brute_force_subdomains, check_subdomains, ReconConfig, ReconEngine};

// 导出其他有用的类型
pub use candidates::{load_labels, Candidate};
pub use dns_resolver::{DnsQuery, DnsRecord, DnsResolver, QueryType};
pub use echo::{EchoProbe, PingMethod};
pub use engine::{DiscoveryEngine, DiscoveryReport};
pub use error::{QueryFailure, ReconError};
pub use prober::{probe, ExistenceTest, Outcome, TestKind, Verdict};
pub use records::{RecordFetcher, RecordSet, RecordTable};
pub use srv::SrvSpec;
pub use wildcard::WildcardDetector;
