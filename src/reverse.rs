//! 反向查询

use std::net::IpAddr;

use crate::dns_resolver::DnsQuery;
use crate::error::{QueryFailure, ReconError};

/// PTR反向查询
///
/// 没有PTR记录时返回 [`ReconError::ReverseLookupNotFound`]。
pub async fn reverse_lookup(resolver: &dyn DnsQuery, ip: IpAddr) -> Result<Vec<String>, ReconError> {
    match resolver.reverse(ip).await {
        Ok(names) if !names.is_empty() => Ok(names),
        Ok(_) | Err(QueryFailure::NxDomain) | Err(QueryFailure::NoAnswer) => {
            Err(ReconError::ReverseLookupNotFound(ip))
        }
        Err(failure) => Err(ReconError::Query(failure)),
    }
}
