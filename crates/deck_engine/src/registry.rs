use deck_logging::deck_debug;
use reqwest::header::AUTHORIZATION;

use crate::http::{join, map_reqwest_error, parse_base, read_json};
use crate::{ArtifactRecord, ArtifactRegistry, NewArtifact, RegistrySettings, ServiceError, Session};

/// Inserts artifact rows through a PostgREST endpoint and returns the stored rows.
#[derive(Debug, Clone)]
pub struct RestArtifactRegistry {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    anon_key: String,
}

impl RestArtifactRegistry {
    pub fn new(client: reqwest::Client, settings: &RegistrySettings) -> Result<Self, ServiceError> {
        let base = parse_base(&settings.rest_url)?;
        let endpoint = join(&base, &format!("rest/v1/{}", settings.table))?;
        Ok(Self {
            client,
            endpoint,
            anon_key: settings.anon_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ArtifactRegistry for RestArtifactRegistry {
    async fn register(
        &self,
        rows: &[NewArtifact],
        session: &Session,
    ) -> Result<Vec<ArtifactRecord>, ServiceError> {
        let bearer = session.access_token.as_deref().unwrap_or(&self.anon_key);
        deck_debug!("Inserting {} rows into {}", rows.len(), self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }
}
