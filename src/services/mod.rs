pub mod execution_client;
pub mod interview_service;
pub mod token_service;
