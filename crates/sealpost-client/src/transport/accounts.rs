use async_trait::async_trait;
use sealpost_core::{AccountService, PrivateKey, Registration, ServiceError, User};
use serde::{Deserialize, Serialize};

use super::HttpApi;

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    user: User,
    #[serde(default)]
    private_key: Option<String>,
}

impl From<AuthResponse> for Registration {
    fn from(response: AuthResponse) -> Self {
        Self {
            user: response.user,
            private_key: response.private_key.filter(|k| !k.is_empty()).map(PrivateKey::new),
        }
    }
}

#[async_trait]
impl AccountService for HttpApi {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, ServiceError> {
        let url = self.endpoint(&["auth", "register"])?;
        let body = RegisterRequest { username, email, password };

        let response: AuthResponse = self.parse_json(self.http.post(url).json(&body)).await?;
        if response.private_key.as_deref().is_none_or(str::is_empty) {
            return Err(ServiceError::Malformed("registration returned no private key".into()));
        }
        Ok(response.into())
    }

    async fn login(&self, email: &str, password: &str) -> Result<Registration, ServiceError> {
        let url = self.endpoint(&["auth", "login"])?;
        let body = LoginRequest { email, password };

        let response: AuthResponse = self.parse_json(self.http.post(url).json(&body)).await?;
        Ok(response.into())
    }
}
