use std::sync::Mutex;

use async_trait::async_trait;

use super::*;

#[derive(Default)]
struct FakeSessions {
    sessions: Mutex<Vec<SessionRecord>>,
}

#[async_trait]
impl SessionRepository for FakeSessions {
    async fn create(
        &self,
        user_id: UserId,
        refresh_token_jti: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> AppResult<SessionId> {
        let id = SessionId::new();
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SessionRecord {
                id,
                user_id,
                refresh_token_jti: refresh_token_jti.to_owned(),
                created_at: chrono::Utc::now(),
                expires_at,
                ip_address: ip_address.map(str::to_owned),
                user_agent: user_agent.map(str::to_owned),
                revoked_at: None,
            });
        Ok(id)
    }

    async fn find(&self, session_id: SessionId) -> AppResult<Option<SessionRecord>> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|s| s.id == session_id)
            .cloned())
    }

    async fn rotate(
        &self,
        session_id: SessionId,
        expected_jti: &str,
        new_jti: &str,
        new_expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Option<SessionRecord>> {
        let mut guard = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let now = chrono::Utc::now();
        if let Some(session) = guard.iter_mut().find(|s| {
            s.id == session_id
                && s.revoked_at.is_none()
                && s.expires_at > now
                && s.refresh_token_jti == expected_jti
        }) {
            session.refresh_token_jti = new_jti.to_owned();
            session.expires_at = new_expires_at;
            return Ok(Some(session.clone()));
        }
        Ok(None)
    }

    async fn revoke(&self, session_id: SessionId) -> AppResult<()> {
        let mut guard = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = guard.iter_mut().find(|s| s.id == session_id) {
            session.revoked_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> AppResult<()> {
        let mut guard = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        for session in guard.iter_mut().filter(|s| s.user_id == user_id) {
            session.revoked_at = Some(chrono::Utc::now());
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeBlacklist {
    jtis: Mutex<Vec<String>>,
}

#[async_trait]
impl BlacklistRepository for FakeBlacklist {
    async fn blacklist(
        &self,
        jti: &str,
        _expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()> {
        self.jtis
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(jti.to_owned());
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> AppResult<bool> {
        Ok(self
            .jtis
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|entry| entry == jti))
    }
}

/// In-memory codec that "signs" by serializing claims as a pipe-delimited
/// string — enough to exercise round-tripping without pulling in a real
/// JWT crate for unit tests.
struct FakeCodec;

impl TokenCodec for FakeCodec {
    fn encode(&self, claims: &Claims) -> AppResult<String> {
        Ok(format!(
            "{}|{}|{}|{}|{}|{}|{}",
            claims.subject,
            claims.role.as_str(),
            claims.session_id.map(|s| s.to_string()).unwrap_or_default(),
            claims.token_kind.as_str(),
            claims.jti,
            claims.issued_at.timestamp(),
            claims.expires_at.timestamp(),
        ))
    }

    fn decode(&self, token: &str) -> AppResult<Claims> {
        let parts: Vec<&str> = token.split('|').collect();
        let [subject, role, session_id, kind, jti, issued_at, expires_at] = parts.as_slice()
        else {
            return Err(castellan_core::DomainError::InvalidToken.into());
        };

        Ok(Claims {
            subject: (*subject).to_owned(),
            role: role_from_str(role),
            session_id: uuid::Uuid::parse_str(session_id)
                .ok()
                .map(SessionId::from_uuid),
            token_kind: match *kind {
                "access" => TokenKind::Access,
                "refresh" => TokenKind::Refresh,
                "service_role" => TokenKind::ServiceRole,
                _ => TokenKind::Anon,
            },
            jti: (*jti).to_owned(),
            issued_at: chrono::DateTime::from_timestamp(
                issued_at.parse().unwrap_or_default(),
                0,
            )
            .unwrap_or_default(),
            expires_at: chrono::DateTime::from_timestamp(
                expires_at.parse().unwrap_or_default(),
                0,
            )
            .unwrap_or_default(),
        })
    }
}

fn role_from_str(value: &str) -> Role {
    use std::str::FromStr;
    Role::from_str(value).unwrap_or(Role::Anon)
}

fn build_service() -> (SessionService, Arc<FakeSessions>, Arc<FakeBlacklist>) {
    let sessions = Arc::new(FakeSessions::default());
    let blacklist = Arc::new(FakeBlacklist::default());
    let service = SessionService::new(
        sessions.clone(),
        blacklist.clone(),
        Arc::new(FakeCodec),
        chrono::Duration::minutes(15),
        chrono::Duration::days(30),
    );
    (service, sessions, blacklist)
}

#[tokio::test]
async fn issue_session_creates_a_session_row() {
    let (service, sessions, _blacklist) = build_service();
    let user_id = UserId::new();

    let pair = service
        .issue_session(user_id, Role::Authenticated, None, None)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert!(!pair.access_token.is_empty());
    assert_eq!(sessions.sessions.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
}

#[tokio::test]
async fn refresh_rotates_token_and_invalidates_the_old_one() {
    let (service, _sessions, _blacklist) = build_service();
    let user_id = UserId::new();

    let first = service
        .issue_session(user_id, Role::Authenticated, None, None)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let second = service
        .refresh(&first.refresh_token)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_ne!(first.refresh_token, second.refresh_token);

    let replay = service.refresh(&first.refresh_token).await;
    assert_eq!(
        replay.unwrap_err().domain(),
        Some(&castellan_core::DomainError::SessionExpired)
    );
}

#[tokio::test]
async fn revoked_access_token_fails_introspection() {
    let (service, _sessions, _blacklist) = build_service();
    let user_id = UserId::new();

    let pair = service
        .issue_session(user_id, Role::Authenticated, None, None)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    service
        .revoke_access_token(&pair.access_token)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let result = service.introspect(&pair.access_token).await;
    assert_eq!(
        result.unwrap_err().domain(),
        Some(&castellan_core::DomainError::TokenBlacklisted)
    );
}
