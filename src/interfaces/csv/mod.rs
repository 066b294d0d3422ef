pub mod summary_writer;
