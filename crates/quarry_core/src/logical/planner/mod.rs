pub mod condition_extract;
pub mod plan_select;
