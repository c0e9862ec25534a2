pub mod collector;
pub mod view;
pub mod writer;
pub mod searcher_holder;
