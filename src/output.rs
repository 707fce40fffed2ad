//! 输出格式化

use std::net::IpAddr;

use colored::Colorize;
use itertools::Itertools;
use serde::Serialize;

use crate::dns_resolver::{DnsRecord, QueryType};
use crate::engine::DiscoveryReport;
use crate::error::ReconError;
use crate::prober::{Outcome, TestKind, Verdict};
use crate::records::{RecordSet, RecordTable};
use crate::srv::SrvSpec;

/// 标准输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 逐行文本
    Text,
    /// 结构化JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unsupported output format: {}. supported: text, json", s)),
        }
    }
}

/// 单条记录的输出行
pub fn format_record(domain: &str, record: &DnsRecord) -> String {
    match record {
        DnsRecord::A(ip) => format!("{} has address {}", domain, ip),
        DnsRecord::AAAA(ip) => format!("{} has IPv6 address {}", domain, ip),
        DnsRecord::NS(ns) => format!("Name Server: {} name server {}", domain, ns),
        DnsRecord::MX {
            preference,
            exchange,
        } => format!(
            "Mail Server: {} mail is handled by {} {}",
            domain, preference, exchange
        ),
        DnsRecord::TXT(txt) => format!("{} descriptive text \"{}\"", domain, txt),
        DnsRecord::SRV {
            priority,
            weight,
            port,
            target,
        } => format!(
            "Priority: {}, Weight: {}, Port: {}, Target: {}",
            priority, weight, port, target
        ),
        DnsRecord::PTR(name) => format!("{} domain name pointer {}", domain, name),
    }
}

/// 某个记录类型没有结果时的说明行
pub fn format_absence(query_type: QueryType, set: &RecordSet) -> Option<String> {
    match set {
        RecordSet::Found(_) => None,
        RecordSet::Empty => Some(format!("No {} records found.", query_type)),
        RecordSet::Failed(failure) => Some(format!("{} query failed: {}.", query_type, failure)),
    }
}

/// 记录表的全部输出行，每条记录一行
pub fn record_table_lines(table: &RecordTable) -> Vec<String> {
    let mut lines = Vec::new();
    for (query_type, set) in &table.sets {
        match format_absence(*query_type, set) {
            Some(line) => lines.push(line),
            None => lines.extend(set.records().iter().map(|r| format_record(&table.domain, r))),
        }
    }
    lines
}

/// SRV查询的输出行
pub fn srv_lines(spec: &SrvSpec, set: &RecordSet) -> Vec<String> {
    match format_absence(QueryType::SRV, set) {
        Some(line) => vec![line],
        None => set
            .records()
            .iter()
            .map(|record| format_record(&spec.query_name(), record))
            .collect(),
    }
}

/// `<fqdn>   [TAG]`
pub fn format_verdict(kind: TestKind, verdict: &Verdict) -> String {
    let mut line = format!("{}   [{}]", verdict.target, kind.tag(&verdict.outcome));
    if verdict.wildcard {
        line.push_str(" (wildcard)");
    }
    line
}

fn colored_verdict(kind: TestKind, verdict: &Verdict) -> String {
    let tag = format!("[{}]", kind.tag(&verdict.outcome));
    let tag = match verdict.outcome {
        Outcome::Found if verdict.wildcard => tag.yellow(),
        Outcome::Found => tag.green(),
        Outcome::NotFound => tag.normal(),
        Outcome::Error(_) => tag.red(),
    };
    let mut line = format!("{}   {}", verdict.target, tag);
    if verdict.wildcard {
        line.push_str(&" (wildcard)".yellow().to_string());
    }
    line
}

/// 打印记录表
pub fn print_record_table(table: &RecordTable) {
    for line in record_table_lines(table) {
        println!("{}", line);
    }
    println!();
}

/// 打印SRV记录
pub fn print_srv(spec: &SrvSpec, set: &RecordSet) {
    for line in srv_lines(spec, set) {
        println!("{}", line);
    }
}

/// 打印单个检测结果，带颜色
pub fn print_verdict(kind: TestKind, verdict: &Verdict) {
    println!("{}", colored_verdict(kind, verdict));
}

/// 打印反向查询结果
pub fn print_reverse(ip: IpAddr, names: &[String]) {
    println!("Reverse DNS Lookup: {} -> {}", ip, names.iter().join(", "));
}

/// 发现报告的汇总行
pub fn report_summary(report: &DiscoveryReport) -> String {
    let mut summary = format!(
        "{}: {}/{} {} ({} errors)",
        report.domain,
        report.found().count(),
        report.total,
        match report.kind {
            TestKind::Reachability => "reachable",
            TestKind::Resolvability => "resolved",
        },
        report.errors()
    );
    if let Some(addresses) = &report.wildcard {
        summary.push_str(&format!(
            ", wildcard DNS detected ({})",
            addresses.iter().join(", ")
        ));
    }
    if report.partial {
        summary.push_str(&format!(
            ", PARTIAL: interrupted after {} candidates",
            report.verdicts.len()
        ));
    }
    summary
}

/// JSON模式下域名不存在的输出
pub fn domain_not_found_json(domain: &str) -> serde_json::Value {
    serde_json::json!({ "domain": domain, "error": "domain_not_found" })
}

/// JSON模式下反向查询失败的输出
pub fn reverse_failure_json(ip: IpAddr, err: &ReconError) -> serde_json::Value {
    let kind = match err {
        ReconError::ReverseLookupNotFound(_) => "reverse_lookup_not_found",
        _ => "query_failed",
    };
    serde_json::json!({ "ip": ip, "error": kind, "message": err.to_string() })
}

/// 以格式化的JSON打印到标准输出
pub fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryFailure;
    use chrono::Utc;
    use std::net::Ipv4Addr;

    #[test]
    fn verdict_lines_use_mode_specific_tags() {
        let found = Verdict::new("www.example.com", Outcome::Found);
        let missing = Verdict::new("nope.example.com", Outcome::NotFound);
        let broken = Verdict::new("x.example.com", Outcome::Error("timeout".to_string()));

        assert_eq!(format_verdict(TestKind::Reachability, &found), "www.example.com   [YES]");
        assert_eq!(format_verdict(TestKind::Reachability, &missing), "nope.example.com   [NO]");
        assert_eq!(format_verdict(TestKind::Resolvability, &found), "www.example.com   [FOUND]");
        assert_eq!(
            format_verdict(TestKind::Resolvability, &missing),
            "nope.example.com   [NOT FOUND]"
        );
        assert_eq!(
            format_verdict(TestKind::Resolvability, &broken),
            "x.example.com   [ERROR: timeout]"
        );
    }

    #[test]
    fn wildcard_hits_are_marked() {
        let mut verdict = Verdict::new("random.example.com", Outcome::Found);
        verdict.wildcard = true;
        assert_eq!(
            format_verdict(TestKind::Resolvability, &verdict),
            "random.example.com   [FOUND] (wildcard)"
        );
    }

    #[test]
    fn record_table_prints_one_line_per_record() {
        let table = RecordTable {
            domain: "example.com".to_string(),
            sets: vec![
                (
                    QueryType::A,
                    RecordSet::Found(vec![
                        DnsRecord::A(Ipv4Addr::new(192, 0, 2, 1)),
                        DnsRecord::A(Ipv4Addr::new(192, 0, 2, 2)),
                    ]),
                ),
                (QueryType::NS, RecordSet::Failed(QueryFailure::Timeout)),
                (
                    QueryType::MX,
                    RecordSet::Found(vec![DnsRecord::MX {
                        preference: 10,
                        exchange: "mx.example.com.".to_string(),
                    }]),
                ),
                (QueryType::AAAA, RecordSet::Empty),
            ],
        };

        assert_eq!(
            record_table_lines(&table),
            vec![
                "example.com has address 192.0.2.1",
                "example.com has address 192.0.2.2",
                "NS query failed: query timed out.",
                "Mail Server: example.com mail is handled by 10 mx.example.com.",
                "No AAAA records found.",
            ]
        );
    }

    #[test]
    fn srv_lines_match_record_layout() {
        let spec: SrvSpec = "sip:udp:example.com".parse().unwrap();
        let set = RecordSet::Found(vec![DnsRecord::SRV {
            priority: 10,
            weight: 60,
            port: 5060,
            target: "sip.example.com.".to_string(),
        }]);
        assert_eq!(
            srv_lines(&spec, &set),
            vec!["Priority: 10, Weight: 60, Port: 5060, Target: sip.example.com."]
        );
        assert_eq!(srv_lines(&spec, &RecordSet::Empty), vec!["No SRV records found."]);
    }

    #[test]
    fn summary_marks_partial_and_wildcard_reports() {
        let report = DiscoveryReport {
            domain: "example.com".to_string(),
            kind: TestKind::Resolvability,
            verdicts: vec![
                Verdict::new("a.example.com", Outcome::Found),
                Verdict::new("b.example.com", Outcome::Error("timeout".to_string())),
            ],
            total: 5,
            partial: true,
            wildcard: Some(vec![IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9))]),
            generated_at: Utc::now(),
        };
        assert_eq!(
            report_summary(&report),
            "example.com: 1/5 resolved (1 errors), wildcard DNS detected (203.0.113.9), \
             PARTIAL: interrupted after 2 candidates"
        );
    }

    #[test]
    fn output_format_parses() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn json_errors_stay_machine_readable() {
        let value = domain_not_found_json("nosuchdomain.invalid");
        assert_eq!(value["domain"], "nosuchdomain.invalid");
        assert_eq!(value["error"], "domain_not_found");
        assert!(serde_json::to_string(&value).unwrap().starts_with('{'));

        let ip: IpAddr = "192.0.2.55".parse().unwrap();
        let missing = reverse_failure_json(ip, &ReconError::ReverseLookupNotFound(ip));
        assert_eq!(missing["ip"], "192.0.2.55");
        assert_eq!(missing["error"], "reverse_lookup_not_found");

        let failed = reverse_failure_json(ip, &ReconError::Query(QueryFailure::Timeout));
        assert_eq!(failed["error"], "query_failed");
        assert_eq!(failed["message"], "query timed out");
    }
}
