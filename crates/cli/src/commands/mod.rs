pub mod analyze;
pub mod chat;
pub mod doctor;
pub mod run;
pub mod status;
