pub mod entities;
pub mod errors;
pub mod repositories;
pub mod scheduling;
pub mod value_objects;
