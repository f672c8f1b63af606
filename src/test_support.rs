use chrono::NaiveDate;

use crate::gnss::sim::synthetic_fix;
use crate::gnss::{FixFlags, PositionFix};

pub(crate) fn fix(flags: FixFlags) -> PositionFix {
    let datetime = NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|date| date.and_hms_milli_opt(8, 30, 15, 250))
        .unwrap();

    synthetic_fix(59.437, 24.7536, datetime, flags)
}
