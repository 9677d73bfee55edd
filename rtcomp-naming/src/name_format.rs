//! The name format string: `%n` instance name, `%t` type, `%v`
//! version, `%V` vendor, `%c` category, `%h` host, `%M` manager, `%p` pid.
//! Each `%` token is a context separator — the expanded string, split on the
//! literal `/`s the format author places around each token, is the sequence
//! of naming-hierarchy levels passed to [`crate::manager::NamingManager`].

use rtcomp_core::{Result, RtcError};

/// The substitution values available to a format string.
#[derive(Debug, Clone)]
pub struct NameContext {
    pub instance_name: String,
    pub type_name: String,
    pub version: String,
    pub vendor: String,
    pub category: String,
    pub host: String,
    pub manager: String,
    pub pid: u32,
}

fn token_value(token: char, ctx: &NameContext) -> Option<String> {
    Some(match token {
        'n' => ctx.instance_name.clone(),
        't' => ctx.type_name.clone(),
        'v' => ctx.version.clone(),
        'V' => ctx.vendor.clone(),
        'c' => ctx.category.clone(),
        'h' => ctx.host.clone(),
        'M' => ctx.manager.clone(),
        'p' => ctx.pid.to_string(),
        _ => return None,
    })
}

/// Expand every `%X` token in `format` against `ctx`. A trailing `%` or an
/// unrecognized token is a `BadParameter`.
pub fn expand(format: &str, ctx: &NameContext) -> Result<String> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let token = chars
            .next()
            .ok_or_else(|| RtcError::bad_parameter("name format string ends with a dangling '%'"))?;
        let value =
            token_value(token, ctx).ok_or_else(|| RtcError::bad_parameter(format!("unknown name format token '%{token}'")))?;
        out.push_str(&value);
    }
    Ok(out)
}

/// Expand `format`, then split the result into naming-hierarchy levels on
/// `/` (empty segments, e.g. from a leading or doubled slash, are dropped).
pub fn hierarchy_levels(format: &str, ctx: &NameContext) -> Result<Vec<String>> {
    let expanded = expand(format, ctx)?;
    Ok(expanded.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect())
}

/// As [`hierarchy_levels`], but joined back with `/` into the single
/// `name_path` string [`crate::manager::NamingManager::bind`] expects.
pub fn expand_path(format: &str, ctx: &NameContext) -> Result<String> {
    Ok(hierarchy_levels(format, ctx)?.join("/"))
}
