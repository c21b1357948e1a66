pub mod dependency_graph;
pub mod forbidden_zones;
pub mod instance_generator;
pub mod schedule_service;
pub mod schedule_utils;
pub mod task_vars;
pub mod window_slots;
