//! Directory users (`v1.0/users`)

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::{GraphClient, Method, decode};

const USERS_PATH: &str = "v1.0/users";

/// Fields Graph returns when no projection is requested.
pub const DEFAULT_FIELDS: &[&str] = &[
    "accountEnabled",
    "businessPhones",
    "displayName",
    "givenName",
    "id",
    "jobTitle",
    "mail",
    "mobilePhone",
    "officeLocation",
    "preferredLanguage",
    "surname",
    "userPrincipalName",
];

/// A directory user. Fields outside the default projection land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub business_phones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// `userPrincipalName\tgivenName\tsurname`, for tabular output.
    pub fn short_line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.user_principal_name.as_deref().unwrap_or_default(),
            self.given_name.as_deref().unwrap_or_default(),
            self.surname.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordProfile {
    pub force_change_password_next_sign_in: bool,
    pub password: String,
}

impl fmt::Debug for PasswordProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordProfile")
            .field(
                "force_change_password_next_sign_in",
                &self.force_change_password_next_sign_in,
            )
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub account_enabled: bool,
    pub display_name: String,
    pub mail_nickname: String,
    pub password_profile: PasswordProfile,
    pub user_principal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_premises_immutable_id: Option<String>,
}

/// Partial update; only fields that are `Some` are sent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_profile: Option<PasswordProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
}

fn projection(fields: &[&str]) -> Result<String> {
    if fields.is_empty() {
        return Err(Error::InvalidRequest("no fields provided".into()));
    }
    Ok(fields.join(","))
}

impl GraphClient {
    /// `v1.0/users/{id}` with the id encoded as a single path segment. Guest
    /// principal names carry `#EXT#`, which must not become a fragment.
    fn user_url(&self, id: &str, query: &[(&str, &str)]) -> Result<url::Url> {
        if id.is_empty() {
            return Err(Error::InvalidRequest("no user id provided".into()));
        }
        self.segment_url(USERS_PATH, &[id], query)
    }

    /// Every user in the directory, projected to `fields`.
    pub async fn list_users(&self, fields: &[&str]) -> Result<Vec<User>> {
        projection(fields)?;
        let url = self.list_url(USERS_PATH, fields)?;
        self.list_all(url.as_str()).await
    }

    /// One user by object id or principal name, projected to `fields`.
    pub async fn get_user(&self, id: &str, fields: &[&str]) -> Result<User> {
        let select = projection(fields)?;
        let url = self.user_url(id, &[("$select", select.as_str())])?;
        let body = self.send_url(Method::GET, url).await?;
        decode(&body)
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User> {
        let body = self
            .send_json(Method::POST, USERS_PATH, &[], request)
            .await?;
        let user: User = decode(&body)?;
        info!(
            user_principal_name = %request.user_principal_name,
            "user created"
        );
        Ok(user)
    }

    pub async fn update_user(&self, id: &str, request: &UpdateUserRequest) -> Result<()> {
        let url = self.user_url(id, &[])?;
        self.send_json_url(Method::PATCH, url, request).await?;
        info!(user = id, "user updated");
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        let url = self.user_url(id, &[])?;
        self.send_url(Method::DELETE, url).await?;
        info!(user = id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{seeded_connection, serve};
    use axum::extract::{Path, Query, State};
    use axum::http::{StatusCode, Uri};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    async fn list(
        State(log): State<Log>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        log.lock()
            .unwrap()
            .push(format!("GET users $select={}", query["$select"]));
        Json(json!({
            "value": [
                {"id": "1", "userPrincipalName": "ada@contoso.com", "givenName": "Ada", "surname": "Lovelace"},
                {"id": "2", "userPrincipalName": "alan@contoso.com", "city": "London"},
            ]
        }))
    }

    async fn create(State(log): State<Log>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        log.lock()
            .unwrap()
            .push(format!("POST users {}", body["userPrincipalName"]));
        (
            StatusCode::CREATED,
            Json(json!({"id": "3", "userPrincipalName": body["userPrincipalName"]})),
        )
    }

    async fn get_one(
        State(log): State<Log>,
        Path(id): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        log.lock()
            .unwrap()
            .push(format!("GET {id} $select={}", query["$select"]));
        if id == "missing" {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"code": "Request_ResourceNotFound", "message": "gone"}})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({"@odata.context": "ctx", "id": id, "mail": "ada@contoso.com"})),
        )
    }

    async fn patch_one(
        State(log): State<Log>,
        Path(id): Path<String>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        log.lock().unwrap().push(format!("PATCH {id} {body}"));
        StatusCode::NO_CONTENT
    }

    async fn delete_one(State(log): State<Log>, Path(id): Path<String>) -> StatusCode {
        log.lock().unwrap().push(format!("DELETE {id}"));
        StatusCode::NO_CONTENT
    }

    async fn start() -> (GraphClient, Log) {
        let log: Log = Arc::default();
        let app = Router::new()
            .route("/v1.0/users", get(list).post(create))
            .route(
                "/v1.0/users/{id}",
                get(get_one).patch(patch_one).delete(delete_one),
            )
            .with_state(log.clone());
        let base = serve(app).await;
        let client = GraphClient::new(seeded_connection("at").await).with_base_url(base);
        (client, log)
    }

    #[tokio::test]
    async fn list_users_with_default_fields() {
        let (client, log) = start().await;
        let users = client.list_users(DEFAULT_FIELDS).await.unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].short_line(), "ada@contoso.com\tAda\tLovelace");
        assert_eq!(users[1].extra["city"], "London");
        assert_eq!(
            log.lock().unwrap()[0],
            format!("GET users $select={}", DEFAULT_FIELDS.join(","))
        );
    }

    #[tokio::test]
    async fn empty_projection_is_rejected_locally() {
        let (client, log) = start().await;

        let err = client.list_users(&[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
        assert_eq!(err.to_string(), "invalid request: no fields provided");

        let err = client.get_user("1", &[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_user_projects_fields() {
        let (client, log) = start().await;
        let user = client.get_user("1", &["id", "mail"]).await.unwrap();
        assert_eq!(user.id.as_deref(), Some("1"));
        assert_eq!(user.mail.as_deref(), Some("ada@contoso.com"));
        assert_eq!(log.lock().unwrap()[0], "GET 1 $select=id,mail");
    }

    #[tokio::test]
    async fn get_missing_user_is_graph_error() {
        let (client, _) = start().await;
        let err = client.get_user("missing", DEFAULT_FIELDS).await.unwrap_err();
        assert_eq!(
            err.graph_error().map(|e| e.code.as_str()),
            Some("Request_ResourceNotFound")
        );
    }

    #[tokio::test]
    async fn create_update_delete() {
        let (client, log) = start().await;

        let created = client
            .create_user(&CreateUserRequest {
                account_enabled: true,
                display_name: "Grace Hopper".into(),
                mail_nickname: "grace".into(),
                password_profile: PasswordProfile {
                    force_change_password_next_sign_in: true,
                    password: "hunter2!".into(),
                },
                user_principal_name: "grace@contoso.com".into(),
                on_premises_immutable_id: None,
            })
            .await
            .unwrap();
        assert_eq!(created.id.as_deref(), Some("3"));

        client
            .update_user(
                "3",
                &UpdateUserRequest {
                    job_title: Some("Rear Admiral".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        client.delete_user("3").await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log[0], r#"POST users "grace@contoso.com""#);
        assert_eq!(log[1], r#"PATCH 3 {"jobTitle":"Rear Admiral"}"#);
        assert_eq!(log[2], "DELETE 3");
    }

    #[tokio::test]
    async fn empty_id_is_rejected() {
        let (client, _) = start().await;
        let err = client.delete_user("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn ids_are_sent_as_one_encoded_segment() {
        type Paths = Arc<Mutex<Vec<String>>>;

        async fn record(State(paths): State<Paths>, uri: Uri) -> Json<Value> {
            paths.lock().unwrap().push(uri.to_string());
            Json(json!({"id": "guest"}))
        }

        let paths: Paths = Arc::default();
        let app = Router::new().fallback(record).with_state(paths.clone());
        let base = serve(app).await;
        let client = GraphClient::new(seeded_connection("at").await).with_base_url(base);

        let guest = "alice_contoso.com#EXT#@fabrikam.onmicrosoft.com";
        client.get_user(guest, &["id"]).await.unwrap();
        client.delete_user("../groups/g1").await.unwrap();

        let err = client.delete_user("..").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        assert_eq!(
            *paths.lock().unwrap(),
            vec![
                "/v1.0/users/alice_contoso.com%23EXT%23@fabrikam.onmicrosoft.com?%24select=id"
                    .to_string(),
                "/v1.0/users/..%2Fgroups%2Fg1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn guest_id_round_trips_through_path_extractor() {
        let (client, log) = start().await;
        client
            .get_user("alice_contoso.com#EXT#@fabrikam.onmicrosoft.com", &["id"])
            .await
            .unwrap();
        assert_eq!(
            log.lock().unwrap()[0],
            "GET alice_contoso.com#EXT#@fabrikam.onmicrosoft.com $select=id"
        );
    }

    #[test]
    fn password_is_redacted() {
        let profile = PasswordProfile {
            force_change_password_next_sign_in: false,
            password: "hunter2!".into(),
        };
        assert!(!format!("{profile:?}").contains("hunter2"));
    }
}
