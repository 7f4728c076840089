pub mod compare;
pub mod datatype;
pub mod interval;
pub mod row;
pub mod value;
