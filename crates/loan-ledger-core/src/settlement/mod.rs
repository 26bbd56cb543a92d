pub mod affordability;
pub mod payoff;
