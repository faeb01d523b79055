use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::request::Response;
use super::{lookup_response, until_cancelled, Backend};
use crate::ccp::PasswordRequest;
use crate::errors::Result;
use crate::storage::Storage;

/// Fields of `object/<safe>/[<folder>/...]/<object>`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectRead {
    pub safe: String,
    #[serde(default)]
    pub folder: String,
    pub object: String,
    #[serde(default)]
    pub reason: String,
}

impl Backend {
    #[instrument(skip(self, storage, params, cancel), fields(safe = %params.safe, folder = %params.folder, object = %params.object))]
    pub(crate) async fn object_read(
        &self,
        storage: &dyn Storage,
        params: ObjectRead,
        cancel: &CancellationToken,
    ) -> Result<Option<Response>> {
        let client = self.cache.acquire(storage).await?;

        let request = PasswordRequest {
            safe: params.safe,
            folder: params.folder,
            object: params.object,
            reason: params.reason,
            ..Default::default()
        };

        let lookup = until_cancelled(cancel, client.fetch(&request)).await?;
        lookup_response(lookup)
    }
}
