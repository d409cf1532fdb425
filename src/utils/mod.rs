pub mod db_utils;
pub mod settings_cache;
