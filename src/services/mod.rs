//! Business logic services

pub mod availability;
pub mod devices;
pub mod lifecycle;
pub mod loans;

use crate::{config::LoansConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub devices: devices::DevicesService,
    pub lifecycle: lifecycle::LifecycleService,
    pub loans: loans::LoansService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, loans_config: &LoansConfig) -> AppResult<Self> {
        let tz = loans_config
            .time_zone()
            .map_err(|e| crate::error::AppError::Internal(e.to_string()))?;
        let lifecycle = lifecycle::LifecycleService::new(repository.clone());

        Ok(Self {
            devices: devices::DevicesService::new(
                repository.clone(),
                lifecycle.clone(),
                loans_config.sweep_on_request,
            ),
            loans: loans::LoansService::new(
                repository.clone(),
                lifecycle.clone(),
                tz,
                loans_config.sweep_on_request,
            ),
            lifecycle,
            repository,
        })
    }

    /// Check that the database answers
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await?;
        Ok(())
    }
}
