pub mod decision;
pub mod equity_point;
pub mod fill;
pub mod side;
pub mod trade_action;
