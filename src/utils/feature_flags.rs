pub fn is_truthy(value: impl AsRef<str>) -> bool {
    matches!(
        value.as_ref().trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn is_truthy_env(key: &str) -> bool {
    std::env::var(key).ok().map(is_truthy).unwrap_or(false)
}
