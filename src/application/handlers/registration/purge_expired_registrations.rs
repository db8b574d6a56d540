//! PurgeExpiredRegistrationsHandler - Command handler for the pending
//! registration sweep.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::foundation::Timestamp;
use crate::domain::registration::RegistrationError;
use crate::ports::PendingRegistrationRepository;

/// Command to delete every pending registration past its expiry.
#[derive(Debug, Clone, Copy)]
pub struct PurgeExpiredRegistrationsCommand {
    pub now: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeExpiredRegistrationsResult {
    pub purged: u64,
}

pub struct PurgeExpiredRegistrationsHandler {
    pending_registrations: Arc<dyn PendingRegistrationRepository>,
}

impl PurgeExpiredRegistrationsHandler {
    pub fn new(pending_registrations: Arc<dyn PendingRegistrationRepository>) -> Self {
        Self {
            pending_registrations,
        }
    }

    pub async fn handle(
        &self,
        cmd: PurgeExpiredRegistrationsCommand,
    ) -> Result<PurgeExpiredRegistrationsResult, RegistrationError> {
        let purged = self.pending_registrations.delete_expired(cmd.now).await?;
        if purged > 0 {
            info!(purged, "expired pending registrations purged");
        } else {
            debug!("no expired pending registrations");
        }
        Ok(PurgeExpiredRegistrationsResult { purged })
    }
}
