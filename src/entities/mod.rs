pub mod prelude;

pub mod computers;
pub mod licenses;
pub mod meetings;
pub mod meetings_meta;
pub mod users;
