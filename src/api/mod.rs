pub mod attendance;
pub mod backup;
pub mod employee;
pub mod report;
pub mod settings;
