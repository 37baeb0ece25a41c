pub mod checklist_editor;
pub mod checklist_progress;
pub mod checklist_run;
pub mod config;
pub mod inventory;
pub mod mail;
pub mod session;
