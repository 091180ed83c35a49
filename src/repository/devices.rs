//! Devices and device groups repository

use sqlx::{PgConnection, Pool, Postgres};

const FOREIGN_KEY_VIOLATION: &str = "23503";

use crate::{
    error::{AppError, AppResult},
    models::device::{CreateDevice, Device, DeviceGroup, DeviceGroupInput, UpdateDevice},
};

/// Device columns plus occupancy derived from the device's loans
const DEVICE_SELECT: &str = r#"
    SELECT d.id, d.name, d.description, d.atelier_id, d.group_id,
           d.max_loan_duration, d.not_borrowable, d.deleted,
           EXISTS (
               SELECT 1 FROM loans l
               WHERE l.device_id = d.id AND l.status IN ('upcoming', 'active')
           ) AS occupied,
           d.crea_date, d.modif_date
    FROM devices d
"#;

#[derive(Clone)]
pub struct DevicesRepository {
    pool: Pool<Postgres>,
}

impl DevicesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List devices that are not deleted
    pub async fn list(&self) -> AppResult<Vec<Device>> {
        let query = format!("{} WHERE NOT d.deleted ORDER BY d.name", DEVICE_SELECT);
        let devices = sqlx::query_as::<_, Device>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(devices)
    }

    /// Get a device that is not deleted
    pub async fn get_by_id(&self, id: i32) -> AppResult<Device> {
        let query = format!("{} WHERE d.id = $1 AND NOT d.deleted", DEVICE_SELECT);
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Lock a bookable device row for the rest of the transaction
    pub async fn lock_for_booking(conn: &mut PgConnection, id: i32) -> AppResult<Device> {
        let query = format!(
            "{} WHERE d.id = $1 AND NOT d.deleted FOR UPDATE OF d",
            DEVICE_SELECT
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Lock a device row, deleted or not, to edit loans that reference it
    pub async fn lock_any(conn: &mut PgConnection, id: i32) -> AppResult<Device> {
        let query = format!("{} WHERE d.id = $1 FOR UPDATE OF d", DEVICE_SELECT);
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Create a device
    pub async fn create(&self, data: &CreateDevice) -> AppResult<Device> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO devices (name, description, atelier_id, group_id, max_loan_duration)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.atelier_id)
        .bind(data.group_id)
        .bind(data.max_loan_duration)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_group(e, data.group_id))?;

        self.get_by_id(id).await
    }

    /// Update the fields present in `data`
    pub async fn update(&self, id: i32, data: &UpdateDevice) -> AppResult<Device> {
        // $1 is the device id, so the n-th SET entry binds ${n}
        let mut sets = vec!["modif_date = NOW()".to_string()];

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, sets.len() + 1));
                }
            };
        }

        add_field!(data.name, "name");
        add_field!(data.description, "description");
        add_field!(data.atelier_id, "atelier_id");
        add_field!(data.group_id, "group_id");
        add_field!(data.max_loan_duration, "max_loan_duration");
        add_field!(data.not_borrowable, "not_borrowable");

        let query = format!(
            "UPDATE devices SET {} WHERE id = $1 AND NOT deleted RETURNING id",
            sets.join(", ")
        );

        let mut builder = sqlx::query_scalar::<_, i32>(&query).bind(id);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.name);
        bind_field!(data.description);
        bind_field!(data.atelier_id);
        bind_field!(data.group_id);
        bind_field!(data.max_loan_duration);
        bind_field!(data.not_borrowable);

        let id = builder
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| missing_group(e, data.group_id.flatten()))?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))?;

        self.get_by_id(id).await
    }

    /// Soft delete: hide the device and detach it from its workshop and
    /// group. Loans that reference it are kept.
    pub async fn soft_delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET deleted = TRUE, atelier_id = NULL, group_id = NULL, modif_date = NOW()
            WHERE id = $1 AND NOT deleted
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Device {} not found", id)));
        }
        Ok(())
    }

    // ---- Groups ----

    pub async fn list_groups(&self) -> AppResult<Vec<DeviceGroup>> {
        let groups = sqlx::query_as::<_, DeviceGroup>("SELECT * FROM device_groups ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }

    pub async fn create_group(&self, data: &DeviceGroupInput) -> AppResult<DeviceGroup> {
        let group = sqlx::query_as::<_, DeviceGroup>(
            "INSERT INTO device_groups (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(&data.name)
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }

    pub async fn update_group(&self, id: i32, data: &DeviceGroupInput) -> AppResult<DeviceGroup> {
        sqlx::query_as::<_, DeviceGroup>(
            "UPDATE device_groups SET name = $1, description = $2 WHERE id = $3 RETURNING *",
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device group {} not found", id)))
    }

    /// Delete a group; its devices become ungrouped
    pub async fn delete_group(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE devices SET group_id = NULL, modif_date = NOW() WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM device_groups WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Device group {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }
}

/// A device row can only break its foreign key through `group_id`
fn missing_group(err: sqlx::Error, group_id: Option<i32>) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            let message = match group_id {
                Some(id) => format!("Device group {} does not exist", id),
                None => "Device group does not exist".to_string(),
            };
            return AppError::BadRequest(message);
        }
    }
    err.into()
}
