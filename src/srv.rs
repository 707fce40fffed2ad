//! SRV查询参数

use std::fmt;
use std::str::FromStr;

use crate::error::ReconError;

/// SRV查询参数，命令行格式 `service:protocol:domain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvSpec {
    /// 服务名，不带下划线
    pub service: String,
    /// 协议，不带下划线
    pub protocol: String,
    /// 域名，不带结尾的点
    pub domain: String,
}

impl SrvSpec {
    /// 实际查询的名称 `_service._protocol.domain`
    pub fn query_name(&self) -> String {
        format!("_{}._{}.{}", self.service, self.protocol, self.domain)
    }
}

impl FromStr for SrvSpec {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [service, protocol, domain] => {
                let service = service.trim_start_matches('_');
                let protocol = protocol.trim_start_matches('_');
                let domain = domain.trim_end_matches('.');
                if service.is_empty() || protocol.is_empty() || domain.is_empty() {
                    return Err(ReconError::MalformedSrvSpec(s.to_string()));
                }
                Ok(SrvSpec {
                    service: service.to_string(),
                    protocol: protocol.to_string(),
                    domain: domain.to_string(),
                })
            }
            _ => Err(ReconError::MalformedSrvSpec(s.to_string())),
        }
    }
}

impl fmt::Display for SrvSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.service, self.protocol, self.domain)
    }
}
