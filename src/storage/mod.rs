pub mod file_lock;
pub mod directory;
pub mod segment;
pub mod commit;
pub mod deletion_policy;
pub mod layout;
pub mod accessor;
