// Service layer: business logic shared by the HTTP handlers.

pub mod dashboard;
pub mod flags;
pub mod sentiment;
pub mod surveys;
