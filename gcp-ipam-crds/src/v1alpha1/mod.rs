pub mod ippool;
