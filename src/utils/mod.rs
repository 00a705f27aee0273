pub mod annotation;
pub mod bed;
pub mod contig;
pub mod interval_index;
pub mod number;
pub mod time;
