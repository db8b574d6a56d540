//! SeedPresetPromoCodesHandler - Command handler for installing preset codes.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::foundation::{ErrorCode, Timestamp};
use crate::domain::promo::{PresetDefinition, PromoCode, PromoCodeError, PromoCodeName, DEFAULT_PRESETS};
use crate::ports::PromoCodeRepository;

/// Command to seed preset codes. Safe to run on every startup.
#[derive(Debug, Clone)]
pub struct SeedPresetPromoCodesCommand {
    pub presets: Vec<PresetDefinition>,
}

impl Default for SeedPresetPromoCodesCommand {
    fn default() -> Self {
        Self {
            presets: DEFAULT_PRESETS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedPresetPromoCodesResult {
    pub created: Vec<PromoCodeName>,
    /// Already present; left untouched, including their usage.
    pub existing: Vec<PromoCodeName>,
}

pub struct SeedPresetPromoCodesHandler {
    promo_codes: Arc<dyn PromoCodeRepository>,
}

impl SeedPresetPromoCodesHandler {
    pub fn new(promo_codes: Arc<dyn PromoCodeRepository>) -> Self {
        Self { promo_codes }
    }

    pub async fn handle(
        &self,
        cmd: SeedPresetPromoCodesCommand,
    ) -> Result<SeedPresetPromoCodesResult, PromoCodeError> {
        let now = Timestamp::now();
        let mut result = SeedPresetPromoCodesResult::default();

        for preset in &cmd.presets {
            let code = PromoCode::create(preset.to_new_promo_code(now)?, now)?;

            if self.promo_codes.find_by_code(&code.code).await?.is_some() {
                debug!(promo_code = %code.code, "preset already seeded");
                result.existing.push(code.code);
                continue;
            }

            match self.promo_codes.insert(&code).await {
                Ok(()) => {
                    info!(promo_code = %code.code, max_uses = code.max_uses, "preset seeded");
                    result.created.push(code.code);
                }
                // Another instance seeded it between the lookup and the insert.
                Err(err) if err.code == ErrorCode::AlreadyExists => {
                    result.existing.push(code.code);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(result)
    }
}
