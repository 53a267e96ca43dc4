//! TCP 게임 서버 진입점
//!
//! 환경 설정은 .env 파일 또는 시스템 환경변수에서 로드됩니다.
//!
//! 환경변수:
//! - tcp_host: TCP 서버 호스트 (기본값: "127.0.0.1")
//! - tcp_port: TCP 서버 포트 (기본값: "4000")
//! - region: 서버 리전 태그 (기본값: "EN")
//! - max_connections: 최대 동시 연결 수 (기본값: 1000)
//! - queue_limit: 연결당 프레임 큐 용량 (기본값: 512)
//! - pool_size: 연결당 버퍼 풀 크기 (기본값: 128)

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use shared::{CommanderStore, MemoryCommanderStore};
use tcpserver::{build_default_router, validate_config, TcpServer, TcpServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 환경 설정 로드 및 검증
    let config = TcpServerConfig::from_env()?;
    validate_config(&config)?;

    info!("=== TCP 게임 서버 설정 ===");
    info!("바인드 주소: {}", config.bind_address());
    info!("리전: {}", config.region);
    info!("최대 연결 수: {}", config.max_connections);
    info!("==========================");

    let store: Arc<dyn CommanderStore> = Arc::new(MemoryCommanderStore::new());
    let server = TcpServer::new(config);
    let router = build_default_router(Arc::clone(&server), store);
    server.set_dispatcher(router.into_dispatcher());

    let accept_server = Arc::clone(&server);
    let accept_handle = tokio::spawn(async move {
        if let Err(err) = accept_server.run().await {
            error!("TCP 서버 실행 오류: {:#}", err);
        }
    });

    // 종료 시그널 대기
    tokio::signal::ctrl_c().await?;
    info!("종료 시그널 수신, 서버를 중지합니다...");

    server.set_accepting_connections(false).await;
    accept_handle.abort();

    info!("✅ TCP 서버가 성공적으로 중지되었습니다");
    Ok(())
}
