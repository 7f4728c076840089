pub mod bind_context;
pub mod bind_from;
pub mod bind_query;
pub mod bind_select;
pub mod expr_binder;
pub mod table_list;
