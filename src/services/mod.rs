pub mod ai_service;
pub mod eval_service;
pub mod grading_service;
pub mod hint_service;
pub mod llm_service;
pub mod progress_service;
pub mod prompt_service;
pub mod response_parser;
pub mod session_service;
