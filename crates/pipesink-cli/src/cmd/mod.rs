pub mod graph;
pub mod maintain;
pub mod tick;
