pub mod access_service;
pub mod attempt_locks;
pub mod attempt_service;
pub mod grading_service;
pub mod question_service;
pub mod review_service;
pub mod score_service;
