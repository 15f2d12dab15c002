pub mod trace_service;
