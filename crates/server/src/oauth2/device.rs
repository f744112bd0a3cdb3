//! Native SSO device binding.
//!
//! A device record has no owner except its secret. Any code exchange that
//! presents a known secret is treated as coming from the same physical device,
//! regardless of which user or client it is authorizing. This is a bearer
//! secret, not a device attestation: anyone holding the secret *is* the device
//! as far as this server can tell.

use crate::entity::oauth2_device;
use crate::error::OAuth2Error;
use crate::oauth2::minter::{DEVICE_SECRET_BYTES, random_value};
use crate::oauth2::store::CredentialStore;
use sea_orm::ConnectionTrait;

/// The device an exchange ended up bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundDevice {
    pub device: oauth2_device::Model,
    /// True when the secret was minted during this exchange
    pub minted: bool,
}

/// Resolve the presented secret to a device, or mint and persist a new one.
#[tracing::instrument(skip_all)]
pub async fn bind_device<C: ConnectionTrait>(
    store: &CredentialStore<'_, C>,
    presented_secret: Option<&str>,
) -> Result<BoundDevice, OAuth2Error> {
    if let Some(secret) = presented_secret.filter(|s| !s.is_empty()) {
        if let Some(device) = store.find_device_by_secret(secret).await? {
            tracing::debug!(device_id = %device.id, "Bound known device");
            return Ok(BoundDevice {
                device,
                minted: false,
            });
        }
        tracing::debug!("Presented device secret is unknown, minting a new device");
    }

    let secret = random_value(DEVICE_SECRET_BYTES)?;
    let device = store.insert_device(&secret).await?;
    tracing::info!(device_id = %device.id, "Registered new SSO device");
    Ok(BoundDevice {
        device,
        minted: true,
    })
}
