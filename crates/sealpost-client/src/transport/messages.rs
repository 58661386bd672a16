use async_trait::async_trait;
use sealpost_core::{
    MessageId, MessageStore, OutgoingEnvelope, ServiceError, StoredEnvelope, UserId,
};

use super::HttpApi;

#[async_trait]
impl MessageStore for HttpApi {
    async fn fetch_conversation(
        &self,
        peer: &UserId,
        local: &UserId,
    ) -> Result<Vec<StoredEnvelope>, ServiceError> {
        let url = self.endpoint(&["messages", "conversation", peer.as_str()])?;
        let request = self.http.get(url).query(&[("current_user_id", local.as_str())]);

        self.parse_json(request).await
    }

    async fn send(
        &self,
        sender: &UserId,
        envelope: OutgoingEnvelope,
    ) -> Result<StoredEnvelope, ServiceError> {
        let url = self.endpoint(&["messages", "send"])?;
        let request =
            self.http.post(url).query(&[("sender_id", sender.as_str())]).json(&envelope);

        self.parse_json(request).await
    }

    async fn mark_read(&self, message_id: &MessageId) -> Result<(), ServiceError> {
        let url = self.endpoint(&["messages", message_id.as_str(), "read"])?;
        self.execute(self.http.put(url)).await?;
        Ok(())
    }
}
