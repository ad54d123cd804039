pub mod db;
pub mod meetings;
pub mod memory;
pub mod notifications;
