pub mod attendance;
pub mod employee;
pub mod role;
pub mod settings;
pub mod summary;
pub mod user;
