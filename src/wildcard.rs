//! 泛解析检测

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::dns_resolver::DnsQuery;
use crate::prober::resolve_addresses;

const PROBE_COUNT: usize = 3;
const PROBE_LABEL_LEN: usize = 12;

/// 泛解析检测器
pub struct WildcardDetector {
    resolver: Arc<dyn DnsQuery>,
}

impl WildcardDetector {
    /// 使用给定的DNS协作者
    pub fn new(resolver: Arc<dyn DnsQuery>) -> Self {
        WildcardDetector { resolver }
    }

    /// 检测域名是否存在泛解析，存在时返回泛解析地址
    ///
    /// 随机生成几个不可能存在的子域名，有两个以上能解析即认为存在泛解析。
    pub async fn detect(&self, domain: &str) -> Option<Vec<IpAddr>> {
        let probes = generate_test_subdomains(domain, PROBE_COUNT);
        let mut hits = 0;
        let mut addresses = BTreeSet::new();

        for name in &probes {
            match resolve_addresses(self.resolver.as_ref(), name).await {
                Ok(found) => {
                    hits += 1;
                    addresses.extend(found);
                }
                Err(failure) => debug!("{} 未解析: {}", name, failure),
            }
        }

        if hits >= 2 {
            let addresses: Vec<IpAddr> = addresses.into_iter().collect();
            info!("{} 存在泛解析: {:?}", domain, addresses);
            Some(addresses)
        } else {
            None
        }
    }
}

/// 生成测试用的随机子域名
fn generate_test_subdomains(domain: &str, count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let label: String = (0..PROBE_LABEL_LEN)
                .map(|_| rng.sample(Alphanumeric) as char)
                .collect();
            format!("{}.{}", label.to_lowercase(), domain)
        })
        .collect()
}
