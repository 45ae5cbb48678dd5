use crate::error::AppError;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub fn format_timestamp(clock: &dyn Clock) -> Result<String, AppError> {
    clock
        .now()
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}
