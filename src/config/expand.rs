/// Expands `${NAME}` and `${NAME:default}` references in `input`.
///
/// `lookup` resolves a variable name to its value. A `${` without a closing `}`
/// is kept literally.
///
/// # Errors
///
/// Returns the name of the first variable that `lookup` cannot resolve and that
/// has no default.
///
/// # Example
///
/// ```
/// # use log_pilot::config::expand_vars;
/// let out = expand_vars("hosts: ${ES_HOST:localhost}:${ES_PORT}", |name| {
///     (name == "ES_PORT").then(|| "9200".to_owned())
/// });
/// assert_eq!(out.unwrap(), "hosts: localhost:9200");
/// ```
pub fn expand_vars(
    input: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let reference = &after[..end];
        let (name, default) = match reference.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (reference, None),
        };
        match lookup(name).or_else(|| default.map(str::to_owned)) {
            Some(value) => out.push_str(&value),
            None => return Err(name.to_owned()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
