// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别
// 日志写入 stderr, stdout 留给排车报告
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量 (text / json)
pub const LOG_FORMAT_ENV: &str = "DISPATCH_LOG_FORMAT";

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=transport_dispatch=trace
/// - DISPATCH_LOG_FORMAT: json 时输出 JSON 行
///
/// # 示例
/// ```no_run
/// use transport_dispatch::logging;
/// logging::init();
/// ```
pub fn init() {
    // 从环境变量读取日志级别，默认为 info
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    // DISPATCH_LOG_FORMAT=json: 结构化日志, 便于采集
    if json_format_requested() {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn json_format_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
