pub mod allocation;
pub mod penalty;
pub mod waiver;
