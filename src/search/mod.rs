pub mod projection;
pub mod results;
pub mod duplicates;
pub mod executor;
