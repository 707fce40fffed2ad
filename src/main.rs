use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::{CommandFactory, Parser};
use log::{error, info, warn};
use rdnsrecon::input::{Action, Opts};
use rdnsrecon::logger;
use rdnsrecon::output::{self, OutputFormat};
use rdnsrecon::{ReconEngine, ReconError, SrvSpec};

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    logger::init_logger(opts.verbose);

    let action = opts.action();
    // 没有任何动作参数时打印帮助
    if let Action::Help = action {
        let _ = Opts::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    }

    match run(&opts, action).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// 执行选出的动作，返回是否全部成功
async fn run(opts: &Opts, action: Action) -> Result<bool, Box<dyn std::error::Error>> {
    let format = opts.output_format()?;
    let engine = ReconEngine::new(opts.to_config()?);

    match action {
        Action::Reverse(ip) => run_reverse_lookup(&engine, ip, format).await?,
        Action::Domain {
            domain,
            subdomains,
            wordlist,
        } => return run_domain(&engine, &domain, subdomains, wordlist, format).await,
        Action::Srv(Ok(spec)) => run_srv(&engine, &spec, format).await?,
        // 格式错误属于用户输入错误，不发起查询
        Action::Srv(Err(e)) => eprintln!("{}", e),
        Action::Help => {}
    }

    Ok(true)
}

fn print_domain_not_found(domain: &str, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Text => {
            println!("Domain does not exist.");
            Ok(())
        }
        OutputFormat::Json => output::print_json(&output::domain_not_found_json(domain)),
    }
}

async fn run_reverse_lookup(
    engine: &ReconEngine,
    ip: std::net::IpAddr,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match engine.reverse_lookup(ip).await {
        Ok(names) => match format {
            OutputFormat::Text => output::print_reverse(ip, &names),
            OutputFormat::Json => {
                output::print_json(&serde_json::json!({ "ip": ip, "hostnames": names }))?
            }
        },
        Err(e) if format == OutputFormat::Json => {
            output::print_json(&output::reverse_failure_json(ip, &e))?
        }
        Err(e @ ReconError::ReverseLookupNotFound(_)) => println!("{}", capitalize(&e.to_string())),
        Err(e) => println!("Reverse DNS lookup for {} failed: {}", ip, e),
    }
    Ok(())
}

async fn run_domain(
    engine: &ReconEngine,
    domain: &str,
    subdomains: Option<PathBuf>,
    wordlist: Option<PathBuf>,
    format: OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
    match engine.fetch_records(domain).await {
        Ok(table) => match format {
            OutputFormat::Text => output::print_record_table(&table),
            OutputFormat::Json => output::print_json(&table)?,
        },
        Err(ReconError::DomainNotFound(_)) => print_domain_not_found(domain, format)?,
        Err(e) => return Err(e.into()),
    }

    if subdomains.is_none() && wordlist.is_none() {
        return Ok(true);
    }

    // Ctrl-C 停止发起新的探测，输出已完成的部分结果
    let stop = engine.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，停止发起新的探测");
            stop.store(false, Ordering::Relaxed);
        }
    });

    let mut success = true;

    if let Some(path) = &subdomains {
        let result = engine
            .check_subdomains(domain, path, |verdict| {
                if format == OutputFormat::Text {
                    output::print_verdict(rdnsrecon::TestKind::Reachability, verdict);
                }
            })
            .await;
        success &= finish_discovery(result, format)?;
    }

    if let Some(path) = &wordlist {
        if engine.discovery().is_cancelled() {
            warn!("已中断，跳过字典暴破");
            return Ok(success);
        }
        let result = engine
            .brute_force(domain, path, |verdict| {
                if format == OutputFormat::Text {
                    output::print_verdict(rdnsrecon::TestKind::Resolvability, verdict);
                }
            })
            .await;
        success &= finish_discovery(result, format)?;
    }

    Ok(success)
}

// 一个来源失败不影响另一个来源
fn finish_discovery(
    result: Result<rdnsrecon::DiscoveryReport, ReconError>,
    format: OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
    match result {
        Ok(report) => {
            match format {
                OutputFormat::Text => {
                    let summary = output::report_summary(&report);
                    info!("{}", summary);
                    if report.partial || report.wildcard.is_some() {
                        println!("{}", summary);
                    }
                }
                OutputFormat::Json => output::print_json(&report)?,
            }
            Ok(true)
        }
        Err(e) if e.is_fatal() => {
            eprintln!("{}\nExiting....", e);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_srv(
    engine: &ReconEngine,
    spec: &SrvSpec,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match engine.srv_records(spec).await {
        Ok(set) => match format {
            OutputFormat::Text => output::print_srv(spec, &set),
            OutputFormat::Json => output::print_json(&serde_json::json!({
                "query": spec.query_name(),
                "records": set,
            }))?,
        },
        Err(ReconError::DomainNotFound(_)) => print_domain_not_found(&spec.query_name(), format)?,
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
