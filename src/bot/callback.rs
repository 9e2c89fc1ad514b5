//! Callback payload routing.
//!
//! Payloads are matched by prefix. Several prefixes overlap (`edit_field_`,
//! `edit_vehicle_`, `edit_save` and `edit_cancel` all start with `edit_`), so
//! the longer ones are tried first.

use std::str::FromStr;
use thiserror::Error;

use crate::storage::VehicleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Category,
    Vehicle,
    Odometer,
    PetrolPrice,
    TotalPrice,
    Notes,
}

impl FromStr for EditField {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(EditField::Category),
            "vehicle" => Ok(EditField::Vehicle),
            "odometer" => Ok(EditField::Odometer),
            "petrol" => Ok(EditField::PetrolPrice),
            "total" => Ok(EditField::TotalPrice),
            "notes" => Ok(EditField::Notes),
            other => Err(CallbackError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    EditField(EditField),
    EditVehicle(VehicleType),
    EditSave,
    EditCancel,
    Edit(i64),
    Delete(i64),
    ConfirmDelete,
    ConfirmNo,
    Group(String),
    Category(String),
    Vehicle(VehicleType),
    BackToGroups,
    BackToMain,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("unknown callback payload: {0}")]
    Unknown(String),

    #[error("invalid expense id: {0}")]
    InvalidId(String),

    #[error("unknown edit field: {0}")]
    UnknownField(String),

    #[error("unknown vehicle type: {0}")]
    UnknownVehicle(String),
}

impl CallbackError {
    /// Text shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            CallbackError::UnknownField(_) => "Invalid edit field selection.",
            CallbackError::UnknownVehicle(_) => "Invalid vehicle type.",
            _ => "Invalid selection. Please try again.",
        }
    }
}

fn parse_id(raw: &str) -> Result<i64, CallbackError> {
    raw.parse::<i64>()
        .map_err(|_| CallbackError::InvalidId(raw.to_string()))
}

fn parse_vehicle(raw: &str) -> Result<VehicleType, CallbackError> {
    raw.parse::<VehicleType>()
        .map_err(|_| CallbackError::UnknownVehicle(raw.to_string()))
}

impl FromStr for CallbackData {
    type Err = CallbackError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        if let Some(field) = data.strip_prefix("edit_field_") {
            return field.parse().map(CallbackData::EditField);
        }
        if let Some(vehicle) = data.strip_prefix("edit_vehicle_") {
            return parse_vehicle(vehicle).map(CallbackData::EditVehicle);
        }
        match data {
            "edit_save" => return Ok(CallbackData::EditSave),
            "edit_cancel" => return Ok(CallbackData::EditCancel),
            _ => {}
        }
        if let Some(id) = data.strip_prefix("edit_") {
            return parse_id(id).map(CallbackData::Edit);
        }
        if let Some(id) = data.strip_prefix("delete_") {
            return parse_id(id).map(CallbackData::Delete);
        }
        match data {
            "confirm_delete" => return Ok(CallbackData::ConfirmDelete),
            "confirm_no" => return Ok(CallbackData::ConfirmNo),
            _ => {}
        }
        if let Some(group) = data.strip_prefix("group_") {
            return Ok(CallbackData::Group(group.to_string()));
        }
        if let Some(name) = data.strip_prefix("category_") {
            return Ok(CallbackData::Category(name.to_string()));
        }
        if let Some(vehicle) = data.strip_prefix("vehicle_") {
            return parse_vehicle(vehicle).map(CallbackData::Vehicle);
        }
        match data {
            "back_to_groups" => Ok(CallbackData::BackToGroups),
            "back_to_main" => Ok(CallbackData::BackToMain),
            other => Err(CallbackError::Unknown(other.to_string())),
        }
    }
}
