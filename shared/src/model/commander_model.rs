//! 지휘관(플레이어) 모델
//!
//! 로그인한 세션이 캐시하는 지휘관 레코드와,
//! 계정 ID 기반 조회를 추상화하는 저장소 트레이트를 정의합니다.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 지휘관 레코드
///
/// 계정 하나당 지휘관 하나가 존재하며, 로그인 완료 시 클라이언트에 캐시됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commander {
    pub account_id: u32,
    pub commander_id: u32,
    pub name: String,
    pub level: u32,
}

/// 저장소 조회 에러
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// 계정에 해당하는 지휘관이 존재하지 않음
    #[error("계정 {0}에 해당하는 지휘관이 없습니다")]
    NotFound(u32),
}

/// 지휘관 저장소 인터페이스
///
/// 영속화 계층은 이 트레이트 뒤에 숨겨지며, 연결 엔진은
/// 계정 ID 기반 조회만 수행합니다.
pub trait CommanderStore: Send + Sync {
    /// 계정 ID로 지휘관을 조회합니다.
    fn find_by_account(&self, account_id: u32) -> Result<Commander, StoreError>;

    /// 지휘관 레코드를 저장합니다.
    fn upsert(&self, commander: Commander);
}

/// 메모리 기반 지휘관 저장소
///
/// 개발 서버와 테스트에서 사용하는 DashMap 기반 구현입니다.
#[derive(Debug, Default)]
pub struct MemoryCommanderStore {
    commanders: DashMap<u32, Commander>,
}

impl MemoryCommanderStore {
    pub fn new() -> Self {
        Self {
            commanders: DashMap::new(),
        }
    }

    /// 새 계정을 만들고 기본 지휘관을 발급합니다.
    ///
    /// 계정 ID는 0이 아닌 난수로 할당합니다.
    pub fn create_commander(&self, name: &str) -> Commander {
        let mut account_id = rand::random::<u32>();
        if account_id == 0 {
            account_id = 1;
        }
        let commander = Commander {
            account_id,
            commander_id: account_id,
            name: if name.is_empty() {
                format!("Unnamed commander #{}", account_id)
            } else {
                name.to_string()
            },
            level: 1,
        };
        self.commanders.insert(account_id, commander.clone());
        commander
    }

    pub fn len(&self) -> usize {
        self.commanders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commanders.is_empty()
    }
}

impl CommanderStore for MemoryCommanderStore {
    fn find_by_account(&self, account_id: u32) -> Result<Commander, StoreError> {
        self.commanders
            .get(&account_id)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound(account_id))
    }

    fn upsert(&self, commander: Commander) {
        self.commanders.insert(commander.account_id, commander);
    }
}
