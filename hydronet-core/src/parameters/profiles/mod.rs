mod monthly;

pub use monthly::{MonthlyInterpDay, MonthlyProfileParameter};
