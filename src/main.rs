// ==========================================
// 运输调度排车系统 - 命令行入口
// ==========================================
// 用法:
//   transport-dispatch <db_path> <plan_id> [--no-consolidate]
//
// 排车报告以 JSON 输出到 stdout, 日志输出到 stderr (RUST_LOG 控制级别)
// ==========================================

use anyhow::{bail, Context};
use std::sync::{Arc, Mutex};
use transport_dispatch::config::ConfigManager;
use transport_dispatch::db::{init_schema, open_sqlite_connection};
use transport_dispatch::{logging, DispatchApi, SqliteDispatchRepository};

const USAGE: &str = "用法: transport-dispatch <db_path> <plan_id> [--no-consolidate]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut consolidate = true;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--no-consolidate" => consolidate = false,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ => positional.push(arg),
        }
    }
    let [db_path, plan_id] = positional.as_slice() else {
        bail!("{}", USAGE);
    };

    tracing::info!(
        version = transport_dispatch::VERSION,
        %db_path,
        %plan_id,
        consolidate,
        "{}",
        transport_dispatch::APP_NAME
    );

    let conn = open_sqlite_connection(db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    init_schema(&conn).context("初始化数据库表失败")?;
    let conn = Arc::new(Mutex::new(conn));

    let config = ConfigManager::from_connection(conn.clone())
        .map_err(|e| anyhow::anyhow!("初始化配置管理器失败: {}", e))?;
    let repo = Arc::new(SqliteDispatchRepository::from_connection(conn));
    let api = DispatchApi::new(Arc::new(config), repo);

    let report = api.allocate_for_plan(plan_id, consolidate).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
