pub mod lsdb;
pub mod neighbour;
pub mod packet;
pub mod queue;
