//! Op validator — schema-check and clamp inbound client operations.
//!
//! DESIGN
//! ======
//! Stateless: the validator sees only the untrusted JSON payload and has no
//! access to room state. Ownership and existence checks belong to the
//! drawing state. Two hard bounds are enforced here so later stages never
//! see unbounded input: stroke width clamps to [1, 64] and point batches
//! truncate to the first 200 entries.

use serde_json::Value;

use inkroom_wire::types::{ClientOp, Point, Tool};

/// Inclusive bounds for stroke width.
const WIDTH_MIN: f64 = 1.0;
const WIDTH_MAX: f64 = 64.0;

/// Per-message cap on appended points.
const MAX_POINTS_PER_MSG: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error("op payload must be an object")]
    NotAnObject,
    #[error("unknown op type: {0}")]
    UnknownType(String),
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),
    #[error("invalid field: {0}")]
    InvalidField(&'static str),
}

impl inkroom_wire::ErrorCode for ValidateError {
    fn error_code(&self) -> &'static str {
        "E_BAD_OP"
    }
}

/// Validate an untrusted value claimed to be a client op.
///
/// # Errors
///
/// Returns a [`ValidateError`] describing the first rejected field; the
/// value is never partially accepted.
pub fn validate_op(value: &Value) -> Result<ClientOp, ValidateError> {
    let obj = value.as_object().ok_or(ValidateError::NotAnObject)?;
    let t = obj
        .get("t")
        .and_then(Value::as_str)
        .ok_or(ValidateError::MissingField("t"))?;

    match t {
        "stroke_start" => validate_stroke_start(value),
        "stroke_points" => validate_stroke_points(value),
        "stroke_end" => Ok(ClientOp::StrokeEnd { stroke_id: required_stroke_id(value)? }),
        "undo" => Ok(ClientOp::Undo),
        "redo" => Ok(ClientOp::Redo),
        other => Err(ValidateError::UnknownType(other.to_owned())),
    }
}

fn validate_stroke_start(value: &Value) -> Result<ClientOp, ValidateError> {
    let stroke_id = required_stroke_id(value)?;

    let tool = value
        .get("tool")
        .and_then(Value::as_str)
        .and_then(Tool::parse)
        .ok_or(ValidateError::InvalidField("tool"))?;

    let color = value
        .get("color")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .ok_or(ValidateError::MissingField("color"))?
        .to_owned();

    let width = finite_number(value, "width")?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let width = width.clamp(WIDTH_MIN, WIDTH_MAX).round() as u32;

    let x = finite_number(value, "x")?;
    let y = finite_number(value, "y")?;

    Ok(ClientOp::StrokeStart { stroke_id, tool, color, width, x, y })
}

fn validate_stroke_points(value: &Value) -> Result<ClientOp, ValidateError> {
    let stroke_id = required_stroke_id(value)?;

    let raw = value
        .get("points")
        .and_then(Value::as_array)
        .ok_or(ValidateError::MissingField("points"))?;

    // Truncate before validating so a hostile payload cannot buy unbounded
    // work with one message.
    let mut points: Vec<Point> = Vec::with_capacity(raw.len().min(MAX_POINTS_PER_MSG));
    for entry in raw.iter().take(MAX_POINTS_PER_MSG) {
        let pair = entry
            .as_array()
            .filter(|p| p.len() == 2)
            .ok_or(ValidateError::InvalidField("points"))?;
        let x = pair[0]
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or(ValidateError::InvalidField("points"))?;
        let y = pair[1]
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or(ValidateError::InvalidField("points"))?;
        points.push([x, y]);
    }

    Ok(ClientOp::StrokePoints { stroke_id, points })
}

fn required_stroke_id(value: &Value) -> Result<String, ValidateError> {
    value
        .get("strokeId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .ok_or(ValidateError::MissingField("strokeId"))
}

fn finite_number(value: &Value, field: &'static str) -> Result<f64, ValidateError> {
    value
        .get(field)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or(ValidateError::InvalidField(field))
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
