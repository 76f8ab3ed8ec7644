//! Auth and friends glue over the hosted auth service and its REST tables.

use crate::error::{AppError, Result};
use crate::store::KeyValueStore;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;

/// Storage slot holding the signed-in session.
pub const SESSION_KEY: &str = "session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.name.as_deref().unwrap_or("?"),
            self.email.as_deref().unwrap_or("?")
        )
    }
}

/// Primary key of a `friends` row; the table may use integers or UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(id) => write!(f, "{}", id),
            RowId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    Pending,
    Accepted,
}

impl fmt::Display for FriendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FriendStatus::Pending => f.write_str("pendiente"),
            FriendStatus::Accepted => f.write_str("aceptada"),
        }
    }
}

/// A `friends` row. The relation is symmetric: the caller may be either side.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FriendRelationship {
    #[serde(default)]
    pub id: Option<RowId>,
    pub user_id: String,
    #[serde(default)]
    pub friend_id: Option<String>,
    #[serde(default)]
    pub status: Option<FriendStatus>,
}

impl FriendRelationship {
    /// The id on the other side of this row from `me`.
    pub fn other_side(&self, me: &str) -> Option<&str> {
        if self.user_id == me {
            self.friend_id.as_deref()
        } else if self.friend_id.as_deref() == Some(me) {
            Some(&self.user_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FriendRequest {
    pub request_id: RowId,
    pub requester_user_id: String,
    pub status: FriendStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub request: FriendRequest,
    pub requester: Option<UserProfile>,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    store: Arc<dyn KeyValueStore>,
}

impl SupabaseClient {
    pub fn new(
        client: Client,
        base_url: &str,
        anon_key: &str,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            store,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn with_keys(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(token.unwrap_or(&self.anon_key))
    }

    pub fn session(&self) -> Result<Session> {
        let raw = self
            .store
            .get(SESSION_KEY)?
            .ok_or_else(|| AppError::Auth("not signed in".to_string()))?;
        serde_json::from_str(&raw).map_err(|e| {
            warn!("Stored session is unreadable: {}", e);
            AppError::Auth("stored session is invalid, sign in again".to_string())
        })
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.store.set(SESSION_KEY, &serde_json::to_string(session)?)
    }

    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<AuthUser> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "name": name.trim() },
        });
        let request = self.with_keys(self.client.post(self.auth_url("signup")), None);
        let value: Value = check(request.json(&body).send().await?).await?.json().await?;

        let (user, session) = parse_sign_up(value)?;
        if let Some(session) = session {
            self.save_session(&session)?;
        }
        info!("Registered {}", email);
        Ok(user)
    }

    /// Exchange credentials for a session, then make sure the caller has a
    /// `users` row carrying `name`. A failed profile step is logged and does
    /// not undo the sign-in.
    pub async fn sign_in(&self, email: &str, password: &str, name: &str) -> Result<Session> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidArgument("name must not be empty".to_string()));
        }
        let request = self
            .with_keys(self.client.post(self.auth_url("token")), None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let session: Session = check(request.send().await?).await?.json().await?;
        self.save_session(&session)?;
        info!("Signed in as {}", session.user.id);

        if let Err(e) = self.ensure_profile(&session, name).await {
            warn!("Could not set up profile for {}: {}", session.user.id, e);
        }
        Ok(session)
    }

    async fn ensure_profile(&self, session: &Session, name: &str) -> Result<()> {
        let id = &session.user.id;
        let existing: Vec<UserProfile> = self
            .select(
                "users",
                &[
                    ("select", "id,name".to_string()),
                    ("id", format!("eq.{}", id)),
                ],
            )
            .await?;
        let token = Some(session.access_token.as_str());
        let request = match profile_action(existing.first()) {
            ProfileAction::Keep => return Ok(()),
            ProfileAction::Insert => self
                .with_keys(self.client.post(self.rest_url("users")), token)
                .json(&json!([profile_row(&session.user, name)])),
            ProfileAction::SetName => self
                .with_keys(self.client.patch(self.rest_url("users")), token)
                .query(&[("id", format!("eq.{}", id))])
                .json(&json!({ "name": name })),
        };
        check(request.header("Prefer", "return=minimal").send().await?).await?;
        debug!("Profile row ready for {}", id);
        Ok(())
    }

    /// Revoke the session upstream and forget it locally. The local copy is
    /// dropped even if the revoke call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let session = match self.session() {
            Ok(session) => session,
            Err(_) => {
                debug!("Sign out without a session");
                return self.store.remove(SESSION_KEY);
            }
        };
        let request = self.with_keys(
            self.client.post(self.auth_url("logout")),
            Some(&session.access_token),
        );
        match request.send().await.map_err(AppError::from) {
            Ok(response) => {
                if let Err(e) = check(response).await {
                    warn!("Upstream sign out failed: {}", e);
                }
            }
            Err(e) => warn!("Upstream sign out failed: {}", e),
        }
        self.store.remove(SESSION_KEY)
    }

    pub async fn current_user(&self) -> Result<AuthUser> {
        let session = self.session()?;
        let request = self.with_keys(
            self.client.get(self.auth_url("user")),
            Some(&session.access_token),
        );
        Ok(check(request.send().await?).await?.json().await?)
    }

    async fn select<T>(&self, table: &str, params: &[(&str, String)]) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let session = self.session()?;
        let request = self
            .with_keys(self.client.get(self.rest_url(table)), Some(&session.access_token))
            .query(params);
        Ok(check(request.send().await?).await?.json().await?)
    }

    async fn users_by_id(&self, ids: &[String]) -> Result<Vec<UserProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            "users",
            &[
                ("select", "id,name,email".to_string()),
                ("id", in_filter(ids)),
            ],
        )
        .await
    }

    /// Users whose name or email contains `query`, excluding the caller.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let me = self.session()?.user.id;
        let users: Vec<UserProfile> = self
            .select(
                "users",
                &[
                    ("select", "id,name,email".to_string()),
                    ("or", search_filter(query)),
                    ("id", format!("neq.{}", me)),
                ],
            )
            .await?;
        info!("{} users match {:?}", users.len(), query);
        Ok(users)
    }

    pub async fn send_friend_request(&self, friend_id: &str) -> Result<()> {
        let session = self.session()?;
        let row = json!([{
            "user_id": session.user.id,
            "friend_id": friend_id,
            "status": FriendStatus::Pending,
        }]);
        let request = self
            .with_keys(self.client.post(self.rest_url("friends")), Some(&session.access_token))
            .header("Prefer", "return=minimal")
            .json(&row);
        check(request.send().await?).await?;
        info!("Friend request sent to {}", friend_id);
        Ok(())
    }

    pub async fn accept_friend_request(&self, request_id: &str) -> Result<()> {
        let session = self.session()?;
        let request = self
            .with_keys(self.client.patch(self.rest_url("friends")), Some(&session.access_token))
            .query(&[("id", format!("eq.{}", request_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "status": FriendStatus::Accepted }));
        check(request.send().await?).await?;
        info!("Friend request {} accepted", request_id);
        Ok(())
    }

    /// Profiles of everyone with an accepted row on either side.
    pub async fn friends(&self) -> Result<Vec<UserProfile>> {
        let me = self.session()?.user.id;
        let rows: Vec<FriendRelationship> = self
            .select(
                "friends",
                &[
                    ("select", "user_id,friend_id,status".to_string()),
                    ("or", format!("(user_id.eq.{},friend_id.eq.{})", me, me)),
                    ("status", "eq.accepted".to_string()),
                ],
            )
            .await?;
        let ids = friend_ids(&rows, &me);
        self.users_by_id(&ids).await
    }

    /// Pending requests addressed to the caller with the requester's profile.
    pub async fn pending_requests(&self) -> Result<Vec<PendingRequest>> {
        let me = self.session()?.user.id;
        let rows: Vec<FriendRelationship> = self
            .select(
                "friends",
                &[
                    ("select", "id,user_id".to_string()),
                    ("friend_id", format!("eq.{}", me)),
                    ("status", "eq.pending".to_string()),
                ],
            )
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let requester_ids: Vec<String> = rows.iter().map(|r| r.user_id.clone()).collect();
        let users = self.users_by_id(&requester_ids).await?;
        Ok(pair_requests(&rows, &users))
    }
}

/// What sign-in must do to the caller's `users` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAction {
    Insert,
    SetName,
    Keep,
}

pub fn profile_action(existing: Option<&UserProfile>) -> ProfileAction {
    match existing {
        None => ProfileAction::Insert,
        Some(profile) if profile.name.as_deref().is_none_or(|n| n.trim().is_empty()) => {
            ProfileAction::SetName
        }
        Some(_) => ProfileAction::Keep,
    }
}

/// Fresh `users` row for a first sign-in.
pub fn profile_row(user: &AuthUser, name: &str) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "name": name.trim(),
        "total_identifications": 0,
        "fav_plants": [],
    })
}

/// Map 4xx responses to an auth error carrying the service's message.
/// Other failures stay upstream errors.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_client_error() {
        return Ok(response.error_for_status()?);
    }
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = error_message(&body).unwrap_or_else(|| status.to_string());
    Err(AppError::Auth(message))
}

fn error_message(body: &Value) -> Option<String> {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Sign-up answers with a bare user when confirmation is pending, or with a
/// full session when the account is usable immediately.
pub fn parse_sign_up(value: Value) -> Result<(AuthUser, Option<Session>)> {
    if value.get("access_token").is_some() {
        let session: Session = serde_json::from_value(value)?;
        return Ok((session.user.clone(), Some(session)));
    }
    let user_value = value.get("user").cloned().unwrap_or(value);
    Ok((serde_json::from_value(user_value)?, None))
}

/// PostgREST `or` filter matching `query` inside name or email, case-insensitive.
pub fn search_filter(query: &str) -> String {
    let pattern = quote_value(&format!("%{}%", query));
    format!("(name.ilike.{},email.ilike.{})", pattern, pattern)
}

pub fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| quote_value(id)).collect();
    format!("in.({})", quoted.join(","))
}

/// Double-quote a filter value when it contains PostgREST delimiters.
fn quote_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ':', '\\']) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

pub fn friend_ids(rows: &[FriendRelationship], me: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.other_side(me))
        .map(str::to_string)
        .collect()
}

pub fn pair_requests(rows: &[FriendRelationship], users: &[UserProfile]) -> Vec<PendingRequest> {
    rows.iter()
        .filter_map(|row| {
            let request_id = row.id.clone()?;
            Some(PendingRequest {
                request: FriendRequest {
                    request_id,
                    requester_user_id: row.user_id.clone(),
                    status: row.status.unwrap_or(FriendStatus::Pending),
                },
                requester: users.iter().find(|u| u.id == row.user_id).cloned(),
            })
        })
        .collect()
}
