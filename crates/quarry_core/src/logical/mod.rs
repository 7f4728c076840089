pub mod binder;
pub mod logical_aggregate;
pub mod logical_distinct;
pub mod logical_filter;
pub mod logical_join;
pub mod logical_limit;
pub mod logical_materialization;
pub mod logical_order;
pub mod logical_project;
pub mod logical_scan;
pub mod logical_setop;
pub mod logical_single_row;
pub mod operator;
pub mod planner;
pub mod statistics;
