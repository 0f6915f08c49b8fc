pub mod calls;
pub mod submitter;
