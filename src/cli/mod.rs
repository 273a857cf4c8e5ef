pub mod saved_cmd;
pub mod task_cmd;
