//! 日志初始化

use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// 初始化日志，输出到stderr，不干扰stdout上的结果
pub fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .add_filter_allow_str(env!("CARGO_CRATE_NAME"))
        .build();

    // 重复初始化时保留已有的logger
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}
