//! Device and device group models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Borrowable device, with occupancy derived from its loans
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Device {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Owning workshop (cleared when the device is deleted)
    pub atelier_id: Option<i32>,
    pub group_id: Option<i32>,
    /// Maximum loan duration in days
    pub max_loan_duration: i32,
    /// Blocks any new loan regardless of availability
    pub not_borrowable: bool,
    pub deleted: bool,
    /// True while an upcoming or active loan references the device
    pub occupied: bool,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

/// Create device request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDevice {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub atelier_id: Option<i32>,
    pub group_id: Option<i32>,
    #[validate(range(min = 0))]
    pub max_loan_duration: i32,
}

/// Update device request
///
/// Absent fields are left unchanged. For the nullable columns an explicit
/// `null` clears the value.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDevice {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub atelier_id: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub group_id: Option<Option<i32>>,
    #[validate(range(min = 0))]
    pub max_loan_duration: Option<i32>,
    pub not_borrowable: Option<bool>,
}

/// Device group (device type)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DeviceGroup {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

/// Create or update device group request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeviceGroupInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tells_absent_from_null() {
        let update: UpdateDevice =
            serde_json::from_str(r#"{"group_id": null, "atelier_id": 3}"#).unwrap();
        assert_eq!(update.group_id, Some(None));
        assert_eq!(update.atelier_id, Some(Some(3)));
        assert_eq!(update.description, None);
        assert_eq!(update.name, None);
    }
}
