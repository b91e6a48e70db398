pub mod directory;
pub mod inventory;
