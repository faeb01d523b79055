use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::request::Response;
use super::{lookup_response, until_cancelled, Backend};
use crate::ccp::{PasswordRequest, QueryFormat};
use crate::errors::Result;
use crate::storage::Storage;

/// Fields of `query`. Every criterion is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct QueryRead {
    pub safe: String,
    pub folder: String,
    pub object: String,
    pub username: String,
    pub address: String,
    pub database: String,
    pub policy_id: String,
    pub reason: String,
    pub query_format: String,
}

impl Backend {
    #[instrument(skip_all, fields(safe = %params.safe, object = %params.object))]
    pub(crate) async fn query_read(
        &self,
        storage: &dyn Storage,
        params: QueryRead,
        cancel: &CancellationToken,
    ) -> Result<Option<Response>> {
        let format = QueryFormat::parse_optional(Some(&params.query_format))?;

        let client = self.cache.acquire(storage).await?;

        let request = PasswordRequest {
            safe: params.safe,
            folder: params.folder,
            object: params.object,
            username: params.username,
            address: params.address,
            database: params.database,
            policy_id: params.policy_id,
            reason: params.reason,
        };

        let lookup = until_cancelled(cancel, client.search(&request, format)).await?;
        lookup_response(lookup)
    }
}
