//! 主机存活探测
//!
//! 优先使用原始套接字发送 ICMP echo；没有权限时退化为 TCP 连接探测。

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::{IcmpCodes, MutableEchoRequestPacket};
use pnet::packet::icmp::IcmpTypes;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::{util, Packet};
use pnet::transport::{
    icmp_packet_iter, transport_channel, TransportChannelType::Layer4, TransportProtocol,
};
use tokio::net::TcpStream;
use tokio::time::timeout;

const ICMP_SIZE: usize = 64;

/// 回显探测方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingMethod {
    /// 能打开原始套接字就用ICMP，否则TCP
    Auto,
    /// 只用ICMP，没有权限时报错
    Icmp,
    /// 只用TCP连接探测
    TcpConnect,
}

impl FromStr for PingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(PingMethod::Auto),
            "icmp" => Ok(PingMethod::Icmp),
            "tcp" => Ok(PingMethod::TcpConnect),
            _ => Err(format!("unsupported ping method: {}. supported: auto, icmp, tcp", s)),
        }
    }
}

/// 回显协作者
#[async_trait]
pub trait EchoProbe: Send + Sync {
    /// 在 `timeout` 内收到回应返回 `Ok(true)`
    async fn ping(&self, addr: IpAddr, timeout: Duration) -> io::Result<bool>;

    /// 实际使用的探测方式
    fn method(&self) -> PingMethod;
}

/// ICMP echo 探测器，IPv6地址交给TCP探测
pub struct IcmpEcho {
    fallback: TcpConnectEcho,
}

impl IcmpEcho {
    /// 试着打开一次原始套接字，确认有权限
    pub fn open(fallback: TcpConnectEcho) -> io::Result<Self> {
        let protocol = Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
        transport_channel(ICMP_SIZE, protocol)?;
        Ok(IcmpEcho { fallback })
    }
}

#[async_trait]
impl EchoProbe for IcmpEcho {
    async fn ping(&self, addr: IpAddr, timeout: Duration) -> io::Result<bool> {
        match addr {
            IpAddr::V4(v4) => tokio::task::spawn_blocking(move || icmp_echo(v4, timeout))
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            IpAddr::V6(_) => self.fallback.ping(addr, timeout).await,
        }
    }

    fn method(&self) -> PingMethod {
        PingMethod::Icmp
    }
}

fn icmp_echo(addr: Ipv4Addr, wait: Duration) -> io::Result<bool> {
    let protocol = Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
    let (mut tx, mut rx) = transport_channel(4096, protocol)?;

    let identifier = rand::random::<u16>();
    let mut buffer = [0u8; ICMP_SIZE];
    let request = create_echo_request(&mut buffer, identifier)?;
    tx.send_to(request, IpAddr::V4(addr))?;

    let deadline = Instant::now() + wait;
    let mut iter = icmp_packet_iter(&mut rx);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        // 原始套接字会收到本机所有ICMP，按来源和标识过滤
        match iter.next_with_timeout(remaining)? {
            Some((packet, source)) => {
                if source != IpAddr::V4(addr) || packet.get_icmp_type() != IcmpTypes::EchoReply {
                    continue;
                }
                if let Some(reply) = EchoReplyPacket::new(packet.packet()) {
                    if reply.get_identifier() == identifier {
                        return Ok(true);
                    }
                }
            }
            None => return Ok(false),
        }
    }
}

fn create_echo_request(buffer: &mut [u8], identifier: u16) -> io::Result<MutableEchoRequestPacket<'_>> {
    let mut packet = MutableEchoRequestPacket::new(buffer)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "icmp buffer too small"))?;
    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_icmp_code(IcmpCodes::NoCode);
    packet.set_identifier(identifier);
    packet.set_sequence_number(1);
    let checksum = util::checksum(packet.packet(), 1);
    packet.set_checksum(checksum);
    Ok(packet)
}

/// TCP连接探测：任一端口完成握手或被拒绝(RST)都说明主机在线
#[derive(Debug, Clone)]
pub struct TcpConnectEcho {
    ports: Vec<u16>,
}

impl TcpConnectEcho {
    /// `ports` 为空时使用80和443
    pub fn new(ports: Vec<u16>) -> Self {
        let ports = if ports.is_empty() { vec![80, 443] } else { ports };
        TcpConnectEcho { ports }
    }
}

#[async_trait]
impl EchoProbe for TcpConnectEcho {
    async fn ping(&self, addr: IpAddr, wait: Duration) -> io::Result<bool> {
        let deadline = tokio::time::Instant::now() + wait;
        for port in &self.ports {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            let socket_addr = SocketAddr::new(addr, *port);
            match timeout(remaining, TcpStream::connect(socket_addr)).await {
                Ok(Ok(_)) => return Ok(true),
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => return Ok(true),
                Ok(Err(e)) => debug!("{} 连接失败: {}", socket_addr, e),
                Err(_elapsed) => break,
            }
        }
        Ok(false)
    }

    fn method(&self) -> PingMethod {
        PingMethod::TcpConnect
    }
}

/// 按配置选择探测器
///
/// `Auto` 在无法打开原始套接字时退化为TCP探测；显式要求 `Icmp` 时返回错误。
pub fn echo_for(method: PingMethod, tcp_ports: &[u16]) -> io::Result<Arc<dyn EchoProbe>> {
    let tcp = TcpConnectEcho::new(tcp_ports.to_vec());
    match method {
        PingMethod::TcpConnect => Ok(Arc::new(tcp)),
        PingMethod::Icmp => Ok(Arc::new(IcmpEcho::open(tcp)?)),
        PingMethod::Auto => match IcmpEcho::open(tcp.clone()) {
            Ok(icmp) => Ok(Arc::new(icmp)),
            Err(e) => {
                warn!("无法使用ICMP探测({})，改用TCP连接探测 {:?}", e, tcp.ports);
                Ok(Arc::new(tcp))
            }
        },
    }
}
