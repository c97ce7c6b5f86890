use serde_json::Value;

/// Looks up a dotted path such as `data.tokens[0].access_token`.
pub fn lookup<'a>(target: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = target;
    for segment in path
        .split(|c| c == '.' || c == '[' || c == ']')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        current = match current {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// String at `path`, ignoring empty strings.
pub fn lookup_str<'a>(target: &'a Value, path: &str) -> Option<&'a str> {
    lookup(target, path)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
