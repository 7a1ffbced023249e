pub mod path_service;
