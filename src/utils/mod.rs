pub mod data_path;
pub mod feature_flags;
pub mod redact;
pub mod suggest;
