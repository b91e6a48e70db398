pub use super::computers::Entity as Computers;
pub use super::licenses::Entity as Licenses;
pub use super::meetings::Entity as Meetings;
pub use super::meetings_meta::Entity as MeetingsMeta;
pub use super::users::Entity as Users;
