pub mod failure_writer;
pub mod terminology;

pub use failure_writer::FailureWriter;
pub use terminology::{AppliedTerm, Substitution, TerminologyIndex};
