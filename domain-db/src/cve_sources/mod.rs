pub mod cvelist;
