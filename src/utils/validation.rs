//! Parsing and range checks for typed answers.

use thiserror::Error;

pub const MAX_AMOUNT: f64 = 999_999_999.99;
pub const MAX_ODOMETER: f64 = 999_999.9;
pub const MAX_NOTES_CHARS: usize = 500;

/// Numeric prompts; the label names the value in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Odometer,
    PetrolPrice,
    TotalPrice,
}

impl NumericField {
    pub fn label(&self) -> &'static str {
        match self {
            NumericField::Odometer => "odometer reading",
            NumericField::PetrolPrice => "petrol price",
            NumericField::TotalPrice => "total price",
        }
    }
}

/// The `Display` text is sent to the user as-is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please enter a valid number for the {}.", .0.label())]
    NotANumber(NumericField),

    #[error("The {} must be greater than zero.", .0.label())]
    NotPositive(NumericField),

    #[error("The {} cannot be negative.", .0.label())]
    Negative(NumericField),

    #[error("The {} is too large (maximum {max}).", .field.label())]
    TooLarge { field: NumericField, max: f64 },

    #[error("Notes are too long ({len} characters, maximum {max}).", max = MAX_NOTES_CHARS)]
    NotesTooLong { len: usize },
}

/// Parse a number typed by the user and check it against the field's range.
pub fn parse_number(field: NumericField, input: &str) -> Result<f64, ValidationError> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber(field))?;

    if !value.is_finite() {
        return Err(ValidationError::NotANumber(field));
    }

    match field {
        NumericField::Odometer => {
            if value < 0.0 {
                return Err(ValidationError::Negative(field));
            }
            if value > MAX_ODOMETER {
                return Err(ValidationError::TooLarge {
                    field,
                    max: MAX_ODOMETER,
                });
            }
        }
        NumericField::PetrolPrice | NumericField::TotalPrice => {
            if value <= 0.0 {
                return Err(ValidationError::NotPositive(field));
            }
            if value > MAX_AMOUNT {
                return Err(ValidationError::TooLarge {
                    field,
                    max: MAX_AMOUNT,
                });
            }
        }
    }

    Ok(value)
}

pub fn validate_notes(notes: &str) -> Result<String, ValidationError> {
    let notes = notes.trim();
    let len = notes.chars().count();
    if len > MAX_NOTES_CHARS {
        return Err(ValidationError::NotesTooLong { len });
    }
    Ok(notes.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_accepts_valid_input() {
        assert_eq!(parse_number(NumericField::Odometer, " 12000.5 "), Ok(12000.5));
        assert_eq!(parse_number(NumericField::Odometer, "0"), Ok(0.0));
        assert_eq!(parse_number(NumericField::TotalPrice, "1500"), Ok(1500.0));
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        let err = parse_number(NumericField::Odometer, "abc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please enter a valid number for the odometer reading."
        );
        assert_eq!(
            parse_number(NumericField::PetrolPrice, "NaN"),
            Err(ValidationError::NotANumber(NumericField::PetrolPrice))
        );
        assert_eq!(
            parse_number(NumericField::TotalPrice, "inf"),
            Err(ValidationError::NotANumber(NumericField::TotalPrice))
        );
    }

    #[test]
    fn test_parse_number_ranges() {
        assert_eq!(
            parse_number(NumericField::TotalPrice, "0"),
            Err(ValidationError::NotPositive(NumericField::TotalPrice))
        );
        assert_eq!(
            parse_number(NumericField::Odometer, "-1"),
            Err(ValidationError::Negative(NumericField::Odometer))
        );
        assert!(matches!(
            parse_number(NumericField::Odometer, "1000000"),
            Err(ValidationError::TooLarge { .. })
        ));
        assert!(matches!(
            parse_number(NumericField::TotalPrice, "1000000000"),
            Err(ValidationError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_notes() {
        assert_eq!(validate_notes("  lunch  ").unwrap(), "lunch");
        let long = "é".repeat(MAX_NOTES_CHARS + 1);
        assert_eq!(
            validate_notes(&long),
            Err(ValidationError::NotesTooLong {
                len: MAX_NOTES_CHARS + 1
            })
        );
        assert!(validate_notes(&"a".repeat(MAX_NOTES_CHARS)).is_ok());
    }
}
