use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;

use super::{IdentityService, SignupRequest, SignupResponse};

/// Calls a remote `POST /api/users/signup`.
pub struct HttpIdentityClient {
    client: Client,
    base_url: String,
}

impl HttpIdentityClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn signup_url(&self) -> String {
        format!("{}/api/users/signup", self.base_url)
    }
}

#[async_trait]
impl IdentityService for HttpIdentityClient {
    async fn signup(&self, request: SignupRequest) -> Result<SignupResponse> {
        let response = self
            .client
            .post(self.signup_url())
            .json(&request)
            .send()
            .await
            .context("Identity service unreachable")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Signup failed with status {}: {}", status, body);
        }

        response
            .json::<SignupResponse>()
            .await
            .context("Invalid signup response")
    }
}
