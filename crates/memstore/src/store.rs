//! [`DataStore`] implementation and the `accept_rental_request` procedure.

use async_trait::async_trait;
use marketplace::{
    DataStore, Filter, Query, RequestStatus, RentalStatus, StoreError, Table, Timestamp,
    ACCEPT_RENTAL_REQUEST,
};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{MemoryBackend, State};

/// Column sets that must be unique per table, besides `id`.
fn unique_keys(table: Table) -> &'static [&'static [&'static str]] {
    match table {
        Table::Payments => &[&["rental_id", "period_start"]],
        Table::Profiles => &[&["email"]],
        _ => &[],
    }
}

fn matches_all(filters: &[Filter], row: &Value) -> bool {
    filters.iter().all(|f| f.matches(row))
}

fn as_object(table: Table, value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode {
            table: table.to_string(),
            message: format!("expected a JSON object, got {other}"),
        }),
    }
}

impl State {
    fn check_unique(
        &self,
        table: Table,
        candidate: &Value,
        skip_index: Option<usize>,
    ) -> Result<(), StoreError> {
        let mut keys: Vec<&[&str]> = vec![&["id"]];
        keys.extend_from_slice(unique_keys(table));
        for key in keys {
            let clash = self.rows(table).iter().enumerate().any(|(index, row)| {
                Some(index) != skip_index
                    && key
                        .iter()
                        .all(|column| {
                            row.get(*column).is_some()
                                && row.get(*column) == candidate.get(*column)
                        })
            });
            if clash {
                return Err(StoreError::Conflict {
                    message: format!(
                        "duplicate key ({}) in '{table}'",
                        key.join(", ")
                    ),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn insert_row(&mut self, table: Table, row: Value) -> Result<Value, StoreError> {
        let mut map = as_object(table, row)?;
        if map.get("id").is_none_or(Value::is_null) {
            map.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if map.get("created_at").is_none_or(Value::is_null) {
            map.insert("created_at".into(), json!(Timestamp::now()));
        }
        let row = Value::Object(map);
        self.check_unique(table, &row, None)?;
        self.rows_mut(table).push(row.clone());
        Ok(row)
    }

    pub(crate) fn update_rows(
        &mut self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let patch = as_object(table, patch)?;
        let targets: Vec<usize> = self
            .rows(table)
            .iter()
            .enumerate()
            .filter(|(_, row)| matches_all(filters, row))
            .map(|(index, _)| index)
            .collect();

        // Validate every candidate before touching anything so a conflict
        // leaves the table unchanged.
        let mut updated = Vec::with_capacity(targets.len());
        for &index in &targets {
            let mut row = self.rows(table)[index].clone();
            if let Value::Object(map) = &mut row {
                for (column, value) in &patch {
                    map.insert(column.clone(), value.clone());
                }
            }
            self.check_unique(table, &row, Some(index))?;
            updated.push(row);
        }

        let rows = self.rows_mut(table);
        for (&index, row) in targets.iter().zip(&updated) {
            rows[index] = row.clone();
        }
        Ok(updated)
    }

    fn find_index(&self, table: Table, id: &str) -> Option<usize> {
        self.rows(table)
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id))
    }

    /// `accept_rental_request`, applied to `self` as one unit.
    pub(crate) fn accept_rental_request(&mut self, args: &Value) -> Result<Value, StoreError> {
        let request_id = args
            .get("request_id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::unavailable("accept_rental_request requires 'request_id'"))?
            .to_owned();

        let request_index = self
            .find_index(Table::RentalRequests, &request_id)
            .ok_or_else(|| StoreError::Conflict {
                message: format!("rental request {request_id} does not exist"),
            })?;
        let request = self.rows(Table::RentalRequests)[request_index].clone();
        if request["status"] != json!(RequestStatus::Pending) {
            return Err(StoreError::Conflict {
                message: format!(
                    "rental request {request_id} is {}, not pending",
                    request["status"]
                ),
            });
        }

        let property_id = request["property_id"].as_str().unwrap_or_default().to_owned();
        let property_index = self
            .find_index(Table::Properties, &property_id)
            .ok_or(StoreError::NoRoomsAvailable)?;
        let property = self.rows(Table::Properties)[property_index].clone();
        let total = property["total_rooms"].as_u64().unwrap_or(0);
        let available = property["available_rooms"].as_u64().unwrap_or(0);
        if available == 0 {
            return Err(StoreError::NoRoomsAvailable);
        }
        let room_number = total.saturating_sub(available) + 1;
        let remaining = available - 1;

        let now = json!(Timestamp::now());
        let rental = self.insert_row(
            Table::Rentals,
            json!({
                "property_id": property_id,
                "student_id": request["student_id"],
                "landlord_id": request["landlord_id"],
                "request_id": request_id,
                "room_number": room_number,
                "start_date": request["desired_move_in"],
                "end_date": null,
                "monthly_rent": property["monthly_rent"],
                "status": RentalStatus::Active,
            }),
        )?;

        if let Value::Object(map) = &mut self.rows_mut(Table::Properties)[property_index] {
            map.insert("available_rooms".into(), json!(remaining));
            if remaining == 0 {
                map.insert("is_available".into(), json!(false));
            }
        }
        if let Value::Object(map) = &mut self.rows_mut(Table::RentalRequests)[request_index] {
            map.insert("status".into(), json!(RequestStatus::Accepted));
            map.insert("responded_at".into(), now);
        }

        Ok(rental)
    }
}

#[async_trait]
impl DataStore for MemoryBackend {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let state = self.state.lock().await;
        Ok(query.apply(state.rows(table)))
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let mut state = self.state.lock().await;
        let stored = state.insert_row(table, row)?;
        debug!(%table, id = %stored["id"], "Inserted row");
        Ok(stored)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let mut state = self.state.lock().await;
        let updated = state.update_rows(table, filters, patch)?;
        debug!(%table, rows = updated.len(), "Updated rows");
        Ok(updated)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let rows = state.rows_mut(table);
        let before = rows.len();
        rows.retain(|row| !matches_all(filters, row));
        let removed = (before - rows.len()) as u64;
        debug!(%table, removed, "Deleted rows");
        Ok(removed)
    }

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .rows(table)
            .iter()
            .filter(|row| matches_all(filters, row))
            .count() as u64)
    }

    #[instrument(skip(self, args))]
    async fn rpc(&self, name: &str, args: Value) -> Result<Value, StoreError> {
        let mut state = self.state.lock().await;
        match name {
            ACCEPT_RENTAL_REQUEST => state.accept_rental_request(&args),
            other => Err(StoreError::NotFound {
                message: format!("procedure {other}"),
            }),
        }
    }
}
