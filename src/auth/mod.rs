mod signup;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    routing::{get, post},
};
use rand::{Rng, distr::Alphanumeric, seq::IndexedRandom};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppError, AppState,
    error::{CoreError, CoreResult},
    model::{Participant, now},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup::signup))
        .route("/me", get(signup::me))
}

/// Resolves bearer credentials to participants. The room core only ever sees
/// the resolved `Participant`.
#[async_trait]
pub trait Identity: Send + Sync {
    async fn resolve(&self, token: &str) -> CoreResult<Participant>;
}

/// Token-backed identity stored in the `profiles` table.
#[derive(Clone)]
pub struct Profiles {
    db_pool: SqlitePool,
    domain: Arc<str>,
}

const TOKEN_LEN: usize = 48;

impl Profiles {
    pub fn new(db_pool: SqlitePool, institution_domain: &str) -> Self {
        Profiles {
            db_pool,
            domain: Arc::from(institution_domain.to_ascii_lowercase()),
        }
    }

    /// Eligibility is decided here, once, and never recomputed.
    pub fn is_institutional(&self, email: &str) -> bool {
        email
            .trim()
            .to_ascii_lowercase()
            .rsplit_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain == &*self.domain)
    }

    /// Creates a profile and returns its freshly issued bearer token.
    pub async fn signup(&self, name: &str, email: &str) -> CoreResult<(String, Participant)> {
        let email = email.trim().to_ascii_lowercase();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(CoreError::validation("a valid email is required"));
        }

        let taken = sqlx::query_as::<_, (i64,)>("SELECT 1 FROM profiles WHERE email=?")
            .bind(&email)
            .fetch_optional(&self.db_pool)
            .await?
            .is_some();
        if taken {
            return Err(CoreError::validation("email is already registered"));
        }

        let alias = match name.trim() {
            "" => random_alias(),
            name => name.to_owned(),
        };
        let participant = Participant {
            id: Uuid::now_v7(),
            display_name: alias,
            eligible: self.is_institutional(&email),
        };
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();

        sqlx::query("INSERT INTO profiles (id,token,email,alias,eligible,created_at) VALUES (?,?,?,?,?,?)")
            .bind(participant.id)
            .bind(&token)
            .bind(&email)
            .bind(&participant.display_name)
            .bind(participant.eligible)
            .bind(now())
            .execute(&self.db_pool)
            .await
            .map_err(|e| match e {
                // A concurrent signup got there between the check and the insert.
                sqlx::Error::Database(err) if err.is_unique_violation() => {
                    CoreError::validation("email is already registered")
                }
                e => CoreError::from(e),
            })?;

        info!(participant = %participant.id, eligible = participant.eligible, "profile created");
        Ok((token, participant))
    }
}

#[async_trait]
impl Identity for Profiles {
    async fn resolve(&self, token: &str) -> CoreResult<Participant> {
        let row: Option<(Uuid, String, bool)> =
            sqlx::query_as("SELECT id,alias,eligible FROM profiles WHERE token=?")
                .bind(token)
                .fetch_optional(&self.db_pool)
                .await?;

        let Some((id, display_name, eligible)) = row else {
            return Err(CoreError::Auth("unknown or expired token".into()));
        };
        Ok(Participant {
            id,
            display_name,
            eligible,
        })
    }
}

fn random_alias() -> String {
    let adjectives = [
        "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
        "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy",
        "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Lucky",
    ];
    let nouns = [
        "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
        "Falcon", "Hawk", "Panda", "Phoenix", "Griffin", "Turtle", "Dolphin", "Whale",
    ];

    let mut rng = rand::rng();
    format!(
        "{} {}",
        adjectives.choose(&mut rng).copied().unwrap_or("Quiet"),
        nouns.choose(&mut rng).copied().unwrap_or("Student"),
    )
}

/// `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extractor for handlers that require a resolved participant.
pub struct Authenticated(pub Participant);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    Profiles: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| CoreError::Auth("missing bearer token".into()))?;
        let profiles = Profiles::from_ref(state);
        Ok(Authenticated(profiles.resolve(token).await?))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::db;

    async fn profiles() -> Profiles {
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        Profiles::new(pool, "ietdavv.edu.in")
    }

    #[tokio::test]
    async fn signup_derives_eligibility_from_domain() {
        let profiles = profiles().await;

        let (token, student) = profiles.signup("Asha", "asha@IETDAVV.edu.in").await.unwrap();
        assert!(student.eligible);
        assert_eq!(profiles.resolve(&token).await.unwrap(), student);

        let (_, outsider) = profiles.signup("Ravi", "ravi@gmail.com").await.unwrap();
        assert!(!outsider.eligible);
    }

    #[tokio::test]
    async fn lookalike_domains_are_not_institutional() {
        let profiles = profiles().await;
        assert!(!profiles.is_institutional("x@evil-ietdavv.edu.in"));
        assert!(!profiles.is_institutional("@ietdavv.edu.in"));
        assert!(profiles.is_institutional(" x@ietdavv.edu.in "));
    }

    #[tokio::test]
    async fn duplicate_email_and_bad_token_are_rejected() {
        let profiles = profiles().await;
        profiles.signup("", "a@ietdavv.edu.in").await.unwrap();

        let dup = profiles.signup("b", "A@ietdavv.edu.in").await;
        assert!(matches!(dup, Err(CoreError::Validation(_))));

        let bad = profiles.resolve("nope").await;
        assert!(matches!(bad, Err(CoreError::Auth(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_signups_for_one_email_yield_one_profile() {
        let profiles = profiles().await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let profiles = profiles.clone();
                tokio::spawn(async move { profiles.signup(&format!("s{i}"), "same@ietdavv.edu.in").await })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(CoreError::Validation(_)) => {}
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(created, 1);
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
