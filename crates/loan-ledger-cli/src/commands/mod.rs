pub mod restructuring;
pub mod schedule;
pub mod servicing;
pub mod settlement;
pub mod terms;
