pub mod analyzers;
pub mod drawdown;
pub mod evaluation;
pub mod guardrails;
pub mod portfolio;
pub mod retry;
pub mod returns;
pub mod var;
