//! 命令行参数

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::api::ReconConfig;
use crate::echo::PingMethod;
use crate::engine::DEFAULT_CONCURRENCY;
use crate::error::ReconError;
use crate::output::OutputFormat;
use crate::srv::SrvSpec;

/// 本次运行要执行的动作
#[derive(Debug)]
pub enum Action {
    /// `--ip`，单独执行，忽略其它动作参数
    Reverse(IpAddr),
    /// `--domain`，记录查询后按需检测子域名列表和字典
    Domain {
        /// 目标域名
        domain: String,
        /// `-s` 子域名列表
        subdomains: Option<PathBuf>,
        /// `-w` 字典
        wordlist: Option<PathBuf>,
    },
    /// `--srv`，格式错误时不发起任何查询
    Srv(Result<SrvSpec, ReconError>),
    /// 没有动作参数
    Help,
}

#[derive(Parser, Debug)]
#[command(name = "rdnsrecon")]
#[command(version)]
#[command(about = "Perform DNS queries, check subdomains and brute-force a wordlist", long_about = None)]
#[allow(missing_docs)]
pub struct Opts {
    /// domain to perform DNS queries on
    #[arg(short, long)]
    pub domain: Option<String>,

    /// file containing subdomain labels, checked by reachability
    #[arg(short, long)]
    pub subdomains: Option<PathBuf>,

    /// wordlist of subdomain labels, checked by DNS resolution
    #[arg(short, long)]
    pub wordlist: Option<PathBuf>,

    /// SRV record query in the format 'service:protocol:domain'
    #[arg(long)]
    pub srv: Option<String>,

    /// IP address for reverse DNS lookup
    #[arg(short, long)]
    pub ip: Option<IpAddr>,

    /// resolvers to use instead of the system configuration
    #[arg(short, long)]
    pub resolvers: Vec<IpAddr>,

    /// concurrent probes
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    pub threads: usize,

    /// reachability probe timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub ping_timeout: u64,

    /// DNS query timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub dns_timeout: u64,

    /// extra DNS attempts after a failed query
    #[arg(long, default_value_t = 0)]
    pub retries: usize,

    /// reachability probe: auto, icmp or tcp
    #[arg(long, default_value = "auto")]
    pub ping_method: String,

    /// ports used by the tcp reachability probe
    #[arg(long, value_delimiter = ',', default_value = "80,443")]
    pub tcp_ports: Vec<u16>,

    /// skip wildcard DNS detection before brute force
    #[arg(long)]
    pub no_wildcard: bool,

    /// output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,

    /// debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Opts {
    /// 按 `--ip` > `--domain` > `--srv` 的优先级选出唯一的动作
    pub fn action(&self) -> Action {
        if let Some(ip) = self.ip {
            return Action::Reverse(ip);
        }
        if let Some(domain) = &self.domain {
            return Action::Domain {
                domain: domain.clone(),
                subdomains: self.subdomains.clone(),
                wordlist: self.wordlist.clone(),
            };
        }
        match &self.srv {
            Some(raw) => Action::Srv(raw.parse()),
            None => Action::Help,
        }
    }

    /// 解析 `--format`
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }

    /// 转换为引擎配置，`--ping-method` 无效时返回错误
    pub fn to_config(&self) -> Result<ReconConfig, String> {
        Ok(ReconConfig {
            resolvers: self.resolvers.clone(),
            concurrency: self.threads,
            ping_timeout: Duration::from_millis(self.ping_timeout),
            dns_timeout: Duration::from_secs(self.dns_timeout),
            dns_attempts: self.retries + 1,
            ping_method: self.ping_method.parse::<PingMethod>()?,
            tcp_ports: self.tcp_ports.clone(),
            detect_wildcard: !self.no_wildcard,
        })
    }
}
