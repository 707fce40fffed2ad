//! 单元测试用的桩协作者

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::dns_resolver::{DnsQuery, DnsRecord, QueryType};
use crate::echo::{EchoProbe, PingMethod};
use crate::error::QueryFailure;

type Answer = Result<Vec<DnsRecord>, QueryFailure>;

/// 确定性的DNS桩
pub struct StubResolver {
    answers: HashMap<(String, QueryType), Answer>,
    names: HashSet<String>,
    ptr: HashMap<IpAddr, Result<Vec<String>, QueryFailure>>,
    wildcard: Option<(String, Ipv4Addr)>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    queried: Mutex<Vec<(String, QueryType)>>,
}

impl StubResolver {
    pub fn new() -> Self {
        StubResolver {
            answers: HashMap::new(),
            names: HashSet::new(),
            ptr: HashMap::new(),
            wildcard: None,
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
            queried: Mutex::new(Vec::new()),
        }
    }

    pub fn with_answer(mut self, name: &str, query_type: QueryType, answer: Answer) -> Self {
        self.names.insert(name.to_string());
        self.answers.insert((name.to_string(), query_type), answer);
        self
    }

    pub fn with_a(self, name: &str, ip: Ipv4Addr) -> Self {
        self.with_answer(name, QueryType::A, Ok(vec![DnsRecord::A(ip)]))
    }

    pub fn with_ptr(mut self, ip: IpAddr, answer: Result<Vec<String>, QueryFailure>) -> Self {
        self.ptr.insert(ip, answer);
        self
    }

    /// `*.domain` 全部解析到 `ip`
    pub fn with_wildcard(mut self, domain: &str, ip: Ipv4Addr) -> Self {
        self.wildcard = Some((format!(".{}", domain), ip));
        self
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<(String, QueryType)> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsQuery for StubResolver {
    async fn query(&self, name: &str, query_type: QueryType) -> Result<Vec<DnsRecord>, QueryFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queried
            .lock()
            .unwrap()
            .push((name.to_string(), query_type));
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }

        if let Some(answer) = self.answers.get(&(name.to_string(), query_type)) {
            return answer.clone();
        }
        if let Some((suffix, ip)) = &self.wildcard {
            if name.ends_with(suffix.as_str()) {
                return match query_type {
                    QueryType::A => Ok(vec![DnsRecord::A(*ip)]),
                    _ => Err(QueryFailure::NoAnswer),
                };
            }
        }
        if self.names.contains(name) {
            Err(QueryFailure::NoAnswer)
        } else {
            Err(QueryFailure::NxDomain)
        }
    }

    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, QueryFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ptr
            .get(&ip)
            .cloned()
            .unwrap_or(Err(QueryFailure::NxDomain))
    }
}

/// 只对指定地址回应的回显桩
pub struct StubEcho {
    alive: HashSet<IpAddr>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubEcho {
    pub fn new(alive: &[IpAddr]) -> Self {
        StubEcho {
            alive: alive.iter().copied().collect(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EchoProbe for StubEcho {
    async fn ping(&self, addr: IpAddr, _timeout: Duration) -> std::io::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.alive.contains(&addr))
    }

    fn method(&self) -> PingMethod {
        PingMethod::TcpConnect
    }
}
