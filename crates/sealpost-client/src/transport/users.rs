use async_trait::async_trait;
use sealpost_core::{ServiceError, User, UserDirectory, UserId};

use super::HttpApi;

#[async_trait]
impl UserDirectory for HttpApi {
    async fn list_users(&self, excluding: Option<&UserId>) -> Result<Vec<User>, ServiceError> {
        let url = self.endpoint(&["users", ""])?;
        let mut request = self.http.get(url);
        if let Some(id) = excluding {
            request = request.query(&[("current_user_id", id.as_str())]);
        }

        self.parse_json(request).await
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, ServiceError> {
        let url = self.endpoint(&["users", user_id.as_str()])?;
        self.parse_json(self.http.get(url)).await
    }

    async fn search_users(
        &self,
        query: &str,
        excluding: Option<&UserId>,
    ) -> Result<Vec<User>, ServiceError> {
        let url = self.endpoint(&["users", "search", query])?;
        let mut request = self.http.get(url);
        if let Some(id) = excluding {
            request = request.query(&[("current_user_id", id.as_str())]);
        }

        self.parse_json(request).await
    }
}
