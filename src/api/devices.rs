//! Device and device group endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        device::{CreateDevice, Device, DeviceGroup, DeviceGroupInput, UpdateDevice},
        loan::{DeviceLoansQuery, Loan},
    },
    AppState,
};

use super::AuthenticatedUser;

/// List devices
#[utoipa::path(
    get,
    path = "/devices",
    tag = "devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Devices that are not deleted", body = Vec<Device>)
    )
)]
pub async fn list_devices(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Device>>> {
    let devices = state.services.devices.list(Utc::now()).await?;
    Ok(Json(devices))
}

/// Get device by ID
#[utoipa::path(
    get,
    path = "/devices/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Device ID")),
    responses(
        (status = 200, description = "Device details", body = Device),
        (status = 404, description = "Device not found")
    )
)]
pub async fn get_device(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Device>> {
    let device = state.services.devices.get_by_id(id, Utc::now()).await?;
    Ok(Json(device))
}

/// Create device
#[utoipa::path(
    post,
    path = "/devices",
    tag = "devices",
    security(("bearer_auth" = [])),
    request_body = CreateDevice,
    responses(
        (status = 201, description = "Device created", body = Device),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Manager rights required")
    )
)]
pub async fn create_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateDevice>,
) -> AppResult<(StatusCode, Json<Device>)> {
    claims.require_manager()?;
    data.validate()?;
    let device = state.services.devices.create(&data).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// Update device
#[utoipa::path(
    put,
    path = "/devices/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Device ID")),
    request_body = UpdateDevice,
    responses(
        (status = 200, description = "Device updated", body = Device),
        (status = 404, description = "Device not found")
    )
)]
pub async fn update_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateDevice>,
) -> AppResult<Json<Device>> {
    claims.require_manager()?;
    data.validate()?;
    let device = state.services.devices.update(id, &data).await?;
    Ok(Json(device))
}

/// Delete device (soft delete, loan history is kept)
#[utoipa::path(
    delete,
    path = "/devices/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Device ID")),
    responses(
        (status = 204, description = "Device deleted"),
        (status = 404, description = "Device not found")
    )
)]
pub async fn delete_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_manager()?;
    state.services.devices.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List bookings of a device
#[utoipa::path(
    get,
    path = "/devices/{id}/loans",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device ID"),
        DeviceLoansQuery
    ),
    responses(
        (status = 200, description = "Device bookings", body = Vec<Loan>),
        (status = 404, description = "Device not found")
    )
)]
pub async fn list_device_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(query): Query<DeviceLoansQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state
        .services
        .loans
        .list_device_loans(id, query.status, Utc::now())
        .await?;
    Ok(Json(loans))
}

/// List device groups
#[utoipa::path(
    get,
    path = "/device-groups",
    tag = "devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Device groups", body = Vec<DeviceGroup>)
    )
)]
pub async fn list_groups(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<DeviceGroup>>> {
    let groups = state.services.devices.list_groups().await?;
    Ok(Json(groups))
}

/// Create device group
#[utoipa::path(
    post,
    path = "/device-groups",
    tag = "devices",
    security(("bearer_auth" = [])),
    request_body = DeviceGroupInput,
    responses(
        (status = 201, description = "Group created", body = DeviceGroup)
    )
)]
pub async fn create_group(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<DeviceGroupInput>,
) -> AppResult<(StatusCode, Json<DeviceGroup>)> {
    claims.require_manager()?;
    data.validate()?;
    let group = state.services.devices.create_group(&data).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Update device group
#[utoipa::path(
    put,
    path = "/device-groups/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Group ID")),
    request_body = DeviceGroupInput,
    responses(
        (status = 200, description = "Group updated", body = DeviceGroup),
        (status = 404, description = "Group not found")
    )
)]
pub async fn update_group(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<DeviceGroupInput>,
) -> AppResult<Json<DeviceGroup>> {
    claims.require_manager()?;
    data.validate()?;
    let group = state.services.devices.update_group(id, &data).await?;
    Ok(Json(group))
}

/// Delete device group (its devices become ungrouped)
#[utoipa::path(
    delete,
    path = "/device-groups/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Group ID")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn delete_group(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_manager()?;
    state.services.devices.delete_group(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
