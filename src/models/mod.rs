pub mod code_session;
pub mod evaluation;
pub mod interview;
pub mod participant;
