pub mod view_generator;
pub mod kind;
pub mod extension;
pub mod convert;
pub mod robust;
pub mod index;
pub mod write;
pub mod map;
pub mod references;
pub mod backup;
