pub mod modification;
