//! Session tokens and challenge caching.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::TestEnv;
use strongbox::db::Tier;
use strongbox::{Authenticator, ChallengeCache, SessionAuthenticator};

#[tokio::test]
async fn test_session_lifecycle() {
    let env = TestEnv::in_memory().await;
    let user = env.create_user("alice", Tier::Free).await;

    let sessions = SessionAuthenticator::new((*env.db).clone()).with_expiry_hours(1);
    let session = sessions.issue(user).await.unwrap();

    let auth: &dyn Authenticator = &sessions;
    let authenticated = auth.authenticate(&session.token).await.unwrap().unwrap();
    assert_eq!(authenticated.username, "alice");

    // Tokens are unique per session
    let second = sessions.issue(user).await.unwrap();
    assert_ne!(second.token, session.token);

    assert!(sessions.revoke(&session.token).await.unwrap());
    assert!(auth.authenticate(&session.token).await.unwrap().is_none());
    assert!(auth.authenticate(&second.token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sessions_removed_with_user() {
    let env = TestEnv::in_memory().await;
    let user = env.create_user("alice", Tier::Free).await;

    let sessions = SessionAuthenticator::new((*env.db).clone());
    let session = sessions.issue(user).await.unwrap();

    strongbox::UserRepository::new(env.db.pool())
        .delete(user)
        .await
        .unwrap();
    assert!(sessions.authenticate(&session.token).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_challenge_taken_once_across_tasks() {
    let cache = Arc::new(ChallengeCache::new(Duration::from_secs(60)));
    cache.insert("alice@example.com", "challenge-1");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache.take("alice@example.com").is_some()
        }));
    }

    let mut taken = 0;
    for handle in handles {
        if handle.await.unwrap() {
            taken += 1;
        }
    }
    assert_eq!(taken, 1);
    assert!(cache.is_empty());
}
