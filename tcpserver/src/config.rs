//! TCP 서버 환경 설정 모듈
//!
//! .env 파일과 환경변수에서 설정을 로드하고 관리합니다.

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

/// TCP 서버 설정 구조체
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    /// TCP 서버 호스트 주소
    pub host: String,
    /// TCP 서버 포트 번호
    pub port: u16,
    /// 서버 리전 태그
    pub region: String,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 연결당 프레임 큐 용량
    pub queue_limit: usize,
    /// 연결당 버퍼 풀 크기
    pub pool_size: usize,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            region: "EN".to_string(),
            max_connections: 1000,
            queue_limit: 512,
            pool_size: 128,
        }
    }
}

impl TcpServerConfig {
    /// 환경변수에서 설정을 로드합니다.
    ///
    /// 로드 순서:
    /// 1. 상위/현재 디렉토리의 .env 파일
    /// 2. 시스템 환경변수
    /// 3. 기본값
    pub fn from_env() -> Result<Self> {
        Self::load_env_file();

        let defaults = Self::default();
        let config = Self {
            host: std::env::var("tcp_host").unwrap_or(defaults.host),
            port: std::env::var("tcp_port")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.port),
            region: std::env::var("region").unwrap_or(defaults.region),
            max_connections: std::env::var("max_connections")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.max_connections),
            queue_limit: std::env::var("queue_limit")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.queue_limit),
            pool_size: std::env::var("pool_size")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.pool_size),
        };

        info!("TCP 서버 설정 로드 완료: {:?}", config);
        Ok(config)
    }

    /// TCP 서버 바인딩 주소를 반환합니다.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// .env 파일을 로드합니다.
    fn load_env_file() {
        let env_paths = ["../.env", ".env", "../../.env"];

        let mut loaded = false;
        for path in env_paths {
            if Path::new(path).exists() && dotenv::from_filename(path).is_ok() {
                info!(".env 파일 로드 성공: {}", path);
                loaded = true;
                break;
            }
        }

        if !loaded {
            warn!(".env 파일을 찾을 수 없습니다. 기본값과 시스템 환경변수를 사용합니다.");
        }
    }
}

/// 설정 검증 유틸리티
pub fn validate_config(config: &TcpServerConfig) -> Result<()> {
    if config.port == 0 {
        anyhow::bail!("유효하지 않은 TCP 포트 번호: {}", config.port);
    }

    if config.host.is_empty() {
        anyhow::bail!("TCP 호스트 주소가 비어있습니다");
    }

    if config.max_connections == 0 {
        anyhow::bail!("최대 연결 수는 0일 수 없습니다");
    }

    if config.queue_limit == 0 {
        anyhow::bail!("프레임 큐 용량은 0일 수 없습니다");
    }

    if config.pool_size == 0 {
        anyhow::bail!("버퍼 풀 크기는 0일 수 없습니다");
    }

    Ok(())
}
