//! Device binding of sessions.

use crate::claims::ClaimsRecord;
use crate::error::AuthError;

/// Checks that a token is used from the device it was issued to.
pub struct SessionBinder;

impl SessionBinder {
    /// Accept unless the claims name a device other than the one on record.
    ///
    /// Binding is opt-in: claims without a device id are always accepted.
    /// Claims with a device id are rejected when no device is on record.
    pub fn check(claims: &ClaimsRecord, recorded_device_id: Option<&str>) -> Result<(), AuthError> {
        match claims.device_id() {
            None => Ok(()),
            Some(device_id) if Some(device_id) == recorded_device_id => Ok(()),
            Some(_) => {
                tracing::debug!(
                    recorded = recorded_device_id.is_some(),
                    "session device does not match record"
                );
                Err(AuthError::DeviceMismatch)
            }
        }
    }
}
