//! Gridwalk - 网格移动游戏会话服务
//!
//! 启动顺序：配置 → 日志 → 数据库（失败即退出）→ 会话注册表 → HTTP/WebSocket 服务

use std::sync::Arc;

use gridwalk::config::{load_config, print_config};
use gridwalk::infrastructure::events::EventPublisher;
use gridwalk::infrastructure::http::{AppState, HttpServer, ServerConfig};
use gridwalk::infrastructure::memory::SessionRegistry;
use gridwalk::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteMoveEventRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},gridwalk={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Gridwalk - 网格移动游戏会话服务");
    print_config(&config);

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 移动事件存储不可用时拒绝启动
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config)
        .await
        .map_err(|e| anyhow::anyhow!("Move event store unreachable: {}", e))?;
    run_migrations(&pool).await?;

    let move_event_repo = Arc::new(SqliteMoveEventRepository::new(pool));
    let event_publisher = Arc::new(EventPublisher::new());
    let registry = Arc::new(SessionRegistry::new(config.game.inactivity_timeout()));

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(registry, event_publisher, move_event_repo);
    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
