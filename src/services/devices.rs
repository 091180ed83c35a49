//! Devices service
//!
//! Occupancy is derived from loan status, so reads bring loan statuses up
//! to date first (when `loans.sweep_on_request` is set).

use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::device::{CreateDevice, Device, DeviceGroup, DeviceGroupInput, UpdateDevice},
    repository::Repository,
};

use super::lifecycle::LifecycleService;

#[derive(Clone)]
pub struct DevicesService {
    repository: Repository,
    lifecycle: LifecycleService,
    sweep_on_request: bool,
}

impl DevicesService {
    pub fn new(repository: Repository, lifecycle: LifecycleService, sweep_on_request: bool) -> Self {
        Self {
            repository,
            lifecycle,
            sweep_on_request,
        }
    }

    async fn refresh(&self, now: DateTime<Utc>) -> AppResult<()> {
        if self.sweep_on_request {
            self.lifecycle.advance_loan_states(now).await?;
        }
        Ok(())
    }

    pub async fn list(&self, now: DateTime<Utc>) -> AppResult<Vec<Device>> {
        self.refresh(now).await?;
        self.repository.devices.list().await
    }

    pub async fn get_by_id(&self, id: i32, now: DateTime<Utc>) -> AppResult<Device> {
        self.refresh(now).await?;
        self.repository.devices.get_by_id(id).await
    }

    pub async fn create(&self, data: &CreateDevice) -> AppResult<Device> {
        let device = self.repository.devices.create(data).await?;
        tracing::info!(device_id = device.id, name = %device.name, "Device created");
        Ok(device)
    }

    pub async fn update(&self, id: i32, data: &UpdateDevice) -> AppResult<Device> {
        let device = self.repository.devices.update(id, data).await?;
        tracing::info!(device_id = id, "Device updated");
        Ok(device)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.devices.soft_delete(id).await?;
        tracing::info!(device_id = id, "Device deleted");
        Ok(())
    }

    // ---- Groups ----
    pub async fn list_groups(&self) -> AppResult<Vec<DeviceGroup>> {
        self.repository.devices.list_groups().await
    }

    pub async fn create_group(&self, data: &DeviceGroupInput) -> AppResult<DeviceGroup> {
        self.repository.devices.create_group(data).await
    }

    pub async fn update_group(&self, id: i32, data: &DeviceGroupInput) -> AppResult<DeviceGroup> {
        self.repository.devices.update_group(id, data).await
    }

    pub async fn delete_group(&self, id: i32) -> AppResult<()> {
        self.repository.devices.delete_group(id).await
    }
}
