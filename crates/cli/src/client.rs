//! Panel HTTP client

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use vpspanel_common::api::{
    ChangePasswordRequest, CreateUserRequest, Dashboard, DeployRequest, DockerManagerRequest,
    Envelope, ExecResult, HealthResponse, LifecycleResult, LoginRequest, LoginResponse,
    SetActiveRequest, SignUpRequest, TerminalExecRequest, UpdateProfileRequest, VpsView,
};
use vpspanel_common::{ActivityEntry, Identity, Role};

/// Client for the panel daemon's HTTP API
pub struct PanelClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl PanelClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and unwrap the `{"success", "data"}` envelope
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("cannot reach panel at {}", self.base_url))?;
        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("unexpected response (HTTP {})", status))?;

        if !envelope.success {
            let message = envelope.error.unwrap_or_else(|| status.to_string());
            match envelope.kind {
                Some(kind) => bail!("{} ({})", message, kind),
                None => bail!("{}", message),
            }
        }
        envelope
            .data
            .ok_or_else(|| anyhow!("response carried no data"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    /// Unauthenticated health check
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .http
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    // Session and profile

    pub async fn sign_up(&self, username: &str, password: &str, email: Option<String>) -> Result<Identity> {
        self.post(
            "/api/auth/signup",
            &SignUpRequest {
                username: username.to_string(),
                password: password.to_string(),
                email,
            },
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        self.post(
            "/api/auth/login",
            &LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            },
        )
        .await
    }

    pub async fn logout(&self) -> Result<bool> {
        self.post("/api/auth/logout", &json!({})).await
    }

    pub async fn me(&self) -> Result<Identity> {
        self.get("/api/auth/me").await
    }

    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> Result<Identity> {
        self.send(self.request(Method::PATCH, "/api/auth/me").json(req))
            .await
    }

    pub async fn change_password(&self, new_password: &str) -> Result<bool> {
        self.post(
            "/api/auth/password",
            &ChangePasswordRequest {
                new_password: new_password.to_string(),
            },
        )
        .await
    }

    // Remote operations

    pub async fn docker_manager(
        &self,
        action: &str,
        vps_id: Option<&str>,
        config: Option<DeployRequest>,
    ) -> Result<LifecycleResult> {
        self.post(
            "/functions/v1/docker-manager",
            &DockerManagerRequest {
                action: action.to_string(),
                vps_id: vps_id.map(str::to_string),
                config,
            },
        )
        .await
    }

    pub async fn exec(&self, vps_id: &str, command: &str, working_directory: Option<&str>) -> Result<ExecResult> {
        self.post(
            "/functions/v1/terminal-exec",
            &TerminalExecRequest {
                vps_id: vps_id.to_string(),
                command: command.to_string(),
                working_directory: working_directory.map(str::to_string),
            },
        )
        .await
    }

    // Registry and activity

    pub async fn list_vps(&self) -> Result<Vec<VpsView>> {
        self.get("/api/vps").await
    }

    pub async fn get_vps(&self, id: &str) -> Result<VpsView> {
        self.get(&format!("/api/vps/{}", id)).await
    }

    pub async fn activity(&self, vps_id: Option<&str>, limit: Option<usize>) -> Result<Vec<ActivityEntry>> {
        let mut query = Vec::new();
        if let Some(vps_id) = vps_id {
            query.push(("vps_id", vps_id.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.send(self.request(Method::GET, "/api/activity").query(&query))
            .await
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        self.get("/api/dashboard").await
    }

    // User management

    pub async fn list_users(&self) -> Result<Vec<Identity>> {
        self.get("/api/admin/users").await
    }

    pub async fn create_user(&self, username: &str, password: &str, role: Role) -> Result<Identity> {
        self.post(
            "/api/admin/users",
            &CreateUserRequest {
                username: username.to_string(),
                password: password.to_string(),
                role,
            },
        )
        .await
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        self.send(self.request(Method::DELETE, &format!("/api/admin/users/{}", id)))
            .await
    }

    pub async fn set_active(&self, id: &str, active: bool) -> Result<Identity> {
        self.post(
            &format!("/api/admin/users/{}/active", id),
            &SetActiveRequest { active },
        )
        .await
    }
}
