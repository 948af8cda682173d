use async_graphql::{InputValueError, InputValueResult, Scalar, ScalarType, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub mod cart;
pub mod item;
pub mod order;
pub mod permission;
pub mod user;

#[derive(sqlx::Type, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(transparent)]
pub struct DateTimeScalar(pub OffsetDateTime);

/// A timestamp, formatted per RFC 3339
#[Scalar(name = "DateTime")]
impl ScalarType for DateTimeScalar {
    fn parse(value: Value) -> InputValueResult<Self> {
        if let Value::String(datetime_str) = &value {
            if let Ok(datetime) = OffsetDateTime::parse(datetime_str, &Rfc3339) {
                return Ok(DateTimeScalar(datetime));
            }
        }

        Err(InputValueError::expected_type(value))
    }

    fn to_value(&self) -> Value {
        Value::String(self.0.format(&Rfc3339).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn datetimes_use_rfc_3339() {
        let scalar = DateTimeScalar(datetime!(2018-10-01 12:30:00 UTC));

        assert_eq!(
            scalar.to_value(),
            Value::String("2018-10-01T12:30:00Z".to_owned())
        );
        assert_eq!(
            DateTimeScalar::parse(Value::String("2018-10-01T12:30:00Z".to_owned())).ok(),
            Some(scalar)
        );
        assert!(DateTimeScalar::parse(Value::Number(5.into())).is_err());
    }
}
