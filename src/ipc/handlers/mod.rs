pub mod core;
pub mod dashboard;
pub mod quizzes;
pub mod results;
pub mod students;
pub mod tables;
