pub mod element;
pub mod observation;
pub mod reference_time;
pub mod station;
