use async_trait::async_trait;
use sealpost_core::{EncryptionService, PrivateKey, PublicKey, ServiceError};
use serde::{Deserialize, Serialize};

use super::HttpApi;

#[derive(Serialize)]
struct EncryptRequest<'a> {
    message: &'a str,
    public_key: &'a str,
}

#[derive(Deserialize)]
struct EncryptResponse {
    encrypted_message: String,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    encrypted_message: &'a str,
    private_key: &'a str,
}

#[derive(Deserialize)]
struct DecryptResponse {
    message: String,
}

#[async_trait]
impl EncryptionService for HttpApi {
    async fn encrypt(
        &self,
        plaintext: &str,
        public_key: &PublicKey,
    ) -> Result<String, ServiceError> {
        let url = self.endpoint(&["crypto", "encrypt"])?;
        let body = EncryptRequest { message: plaintext, public_key: public_key.as_str() };

        let response: EncryptResponse = self.parse_json(self.http.post(url).json(&body)).await?;
        Ok(response.encrypted_message)
    }

    async fn decrypt(
        &self,
        ciphertext: &str,
        private_key: &PrivateKey,
    ) -> Result<String, ServiceError> {
        let url = self.endpoint(&["crypto", "decrypt"])?;
        let body =
            DecryptRequest { encrypted_message: ciphertext, private_key: private_key.expose() };

        let response: DecryptResponse = self.parse_json(self.http.post(url).json(&body)).await?;
        Ok(response.message)
    }
}
