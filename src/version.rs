pub const VERSION: &str = match option_env!("POD_MEMORY_BUILD_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
