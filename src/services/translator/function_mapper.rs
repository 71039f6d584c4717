// Function Mapper
//
// Case-insensitive lookup table from Hive function names to Snowflake
// equivalents. An entry either renames the call head or rebuilds the whole
// call from the already-translated argument list.

use std::collections::HashMap;

/// Builds target call text from translated arguments; `None` means the
/// argument list has a shape the rule does not handle
pub type RewriteFn = fn(&[String]) -> Option<String>;

#[derive(Clone, Copy)]
pub enum FunctionRule {
    Rename(&'static str),
    Rewrite(RewriteFn),
}

impl std::fmt::Debug for FunctionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionRule::Rename(target) => write!(f, "Rename({})", target),
            FunctionRule::Rewrite(_) => write!(f, "Rewrite(..)"),
        }
    }
}

/// Result of applying the table to one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallMapping {
    /// No entry for this function; keep the call as written
    Passthrough,
    Mapped(String),
    /// An entry exists but rejected the argument list
    ArgumentMismatch,
}

pub struct FunctionMapper {
    rules: HashMap<&'static str, FunctionRule>,
}

impl FunctionMapper {
    pub fn new() -> Self {
        use FunctionRule::{Rename, Rewrite};

        let entries: [(&'static str, FunctionRule); 35] = [
            ("collect_list", Rename("ARRAY_AGG")),
            ("size", Rename("ARRAY_SIZE")),
            ("sort_array", Rename("ARRAY_SORT")),
            ("array_distinct", Rename("ARRAY_DISTINCT")),
            ("map_keys", Rename("OBJECT_KEYS")),
            ("if", Rename("IFF")),
            ("percentile_approx", Rename("APPROX_PERCENTILE")),
            ("lcase", Rename("LOWER")),
            ("ucase", Rename("UPPER")),
            ("nvl", Rename("COALESCE")),
            ("rand", Rename("RANDOM")),
            ("collect_set", Rewrite(collect_set)),
            ("array_contains", Rewrite(array_contains)),
            ("unix_timestamp", Rewrite(unix_timestamp)),
            ("from_unixtime", Rewrite(from_unixtime)),
            ("date_add", Rewrite(date_add)),
            ("date_sub", Rewrite(date_sub)),
            ("datediff", Rewrite(datediff)),
            ("year", Rewrite(|args| date_part("YEAR", args))),
            ("quarter", Rewrite(|args| date_part("QUARTER", args))),
            ("month", Rewrite(|args| date_part("MONTH", args))),
            ("day", Rewrite(|args| date_part("DAY", args))),
            ("dayofmonth", Rewrite(|args| date_part("DAY", args))),
            ("hour", Rewrite(|args| date_part("HOUR", args))),
            ("minute", Rewrite(|args| date_part("MINUTE", args))),
            ("second", Rewrite(|args| date_part("SECOND", args))),
            ("weekofyear", Rewrite(|args| date_part("WEEKOFYEAR", args))),
            ("get_json_object", Rewrite(get_json_object)),
            ("concat_ws", Rewrite(concat_ws)),
            ("regexp_extract", Rewrite(regexp_extract)),
            ("percentile", Rewrite(percentile)),
            ("instr", Rewrite(instr)),
            ("locate", Rewrite(locate)),
            ("date_format", Rewrite(date_format)),
            ("from_utc_timestamp", Rewrite(from_utc_timestamp)),
        ];

        Self {
            rules: entries.into_iter().collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<FunctionRule> {
        self.rules.get(name.to_ascii_lowercase().as_str()).copied()
    }

    /// Map a call given its source name and translated argument texts
    pub fn apply(&self, name: &str, args: &[String]) -> CallMapping {
        match self.lookup(name) {
            None => CallMapping::Passthrough,
            Some(FunctionRule::Rename(target)) => {
                CallMapping::Mapped(format!("{}({})", target, args.join(", ")))
            }
            Some(FunctionRule::Rewrite(rule)) => match rule(args) {
                Some(text) => CallMapping::Mapped(text),
                None => CallMapping::ArgumentMismatch,
            },
        }
    }
}

impl Default for FunctionMapper {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_set(args: &[String]) -> Option<String> {
    match args {
        [x] => Some(format!("ARRAY_AGG(DISTINCT {})", x)),
        _ => None,
    }
}

fn array_contains(args: &[String]) -> Option<String> {
    match args {
        [array, value] => Some(format!("ARRAY_CONTAINS({}::VARIANT, {})", value, array)),
        _ => None,
    }
}

fn unix_timestamp(args: &[String]) -> Option<String> {
    match args {
        [] => Some("DATE_PART(EPOCH_SECOND, CURRENT_TIMESTAMP())".to_string()),
        [s] => Some(format!("DATE_PART(EPOCH_SECOND, TO_TIMESTAMP({}))", s)),
        [s, fmt] => Some(format!("DATE_PART(EPOCH_SECOND, TO_TIMESTAMP({}, {}))", s, fmt)),
        _ => None,
    }
}

fn from_unixtime(args: &[String]) -> Option<String> {
    match args {
        [x] => Some(format!(
            "TO_VARCHAR(TO_TIMESTAMP({}), 'YYYY-MM-DD HH24:MI:SS')",
            x
        )),
        [x, fmt] => Some(format!("TO_VARCHAR(TO_TIMESTAMP({}), {})", x, fmt)),
        _ => None,
    }
}

fn date_add(args: &[String]) -> Option<String> {
    match args {
        [d, n] => Some(format!("DATEADD(DAY, {}, {})", n, d)),
        _ => None,
    }
}

fn date_sub(args: &[String]) -> Option<String> {
    match args {
        [d, n] => Some(format!("DATEADD(DAY, {}, {})", negate(n), d)),
        _ => None,
    }
}

fn negate(expr: &str) -> String {
    let trimmed = expr.trim();
    if let Some(positive) = trimmed.strip_prefix('-') {
        if positive.chars().all(|c| c.is_ascii_digit()) && !positive.is_empty() {
            return positive.to_string();
        }
    }
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("-{}", trimmed)
    } else {
        format!("-({})", trimmed)
    }
}

fn datediff(args: &[String]) -> Option<String> {
    match args {
        [end, start] => Some(format!("DATEDIFF(DAY, {}, {})", start, end)),
        _ => None,
    }
}

fn date_part(unit: &str, args: &[String]) -> Option<String> {
    match args {
        [x] => Some(format!("DATE_PART({}, {})", unit, x)),
        _ => None,
    }
}

fn get_json_object(args: &[String]) -> Option<String> {
    let [json, path] = args else {
        return None;
    };
    let inner = path.strip_prefix('\'')?.strip_suffix('\'')?;
    let inner = inner.strip_prefix('$')?;
    let inner = inner.strip_prefix('.').unwrap_or(inner);
    if inner.is_empty() {
        Some(format!("PARSE_JSON({})", json))
    } else {
        Some(format!("GET_PATH(PARSE_JSON({}), '{}')", json, inner))
    }
}

fn concat_ws(args: &[String]) -> Option<String> {
    match args {
        [sep, rest @ ..] if !rest.is_empty() => Some(format!(
            "ARRAY_TO_STRING(ARRAY_CONSTRUCT({}), {})",
            rest.join(", "),
            sep
        )),
        _ => None,
    }
}

fn regexp_extract(args: &[String]) -> Option<String> {
    match args {
        [s, p] => Some(format!("REGEXP_SUBSTR({}, {}, 1, 1, 'e', 1)", s, p)),
        [s, p, i] => Some(format!("REGEXP_SUBSTR({}, {}, 1, 1, 'e', {})", s, p, i)),
        _ => None,
    }
}

fn percentile(args: &[String]) -> Option<String> {
    match args {
        [x, p] => Some(format!("PERCENTILE_CONT({}) WITHIN GROUP (ORDER BY {})", p, x)),
        _ => None,
    }
}

fn instr(args: &[String]) -> Option<String> {
    match args {
        [s, sub] => Some(format!("CHARINDEX({}, {})", sub, s)),
        _ => None,
    }
}

fn locate(args: &[String]) -> Option<String> {
    match args {
        [sub, s] => Some(format!("CHARINDEX({}, {})", sub, s)),
        [sub, s, pos] => Some(format!("CHARINDEX({}, {}, {})", sub, s, pos)),
        _ => None,
    }
}

fn date_format(args: &[String]) -> Option<String> {
    match args {
        [d, fmt] => Some(format!("TO_VARCHAR({}, {})", d, fmt)),
        _ => None,
    }
}

fn from_utc_timestamp(args: &[String]) -> Option<String> {
    match args {
        [ts, tz] => Some(format!("CONVERT_TIMEZONE('UTC', {}, {})", tz, ts)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mapper = FunctionMapper::new();
        assert!(mapper.lookup("NVL").is_some());
        assert!(mapper.lookup("Collect_List").is_some());
        assert!(mapper.lookup("my_udf").is_none());
        assert_eq!(mapper.apply("my_udf", &args(&["x"])), CallMapping::Passthrough);
    }

    #[test]
    fn test_renames() {
        let mapper = FunctionMapper::new();
        assert_eq!(
            mapper.apply("NVL", &args(&["a", "0"])),
            CallMapping::Mapped("COALESCE(a, 0)".to_string())
        );
        assert_eq!(
            mapper.apply("if", &args(&["x > 1", "'y'", "'n'"])),
            CallMapping::Mapped("IFF(x > 1, 'y', 'n')".to_string())
        );
    }

    #[test]
    fn test_argument_rewrites() {
        let mapper = FunctionMapper::new();
        let mapped = |name: &str, a: &[&str]| match mapper.apply(name, &args(a)) {
            CallMapping::Mapped(text) => text,
            other => panic!("{} not mapped: {:?}", name, other),
        };

        assert_eq!(mapped("collect_set", &["id"]), "ARRAY_AGG(DISTINCT id)");
        assert_eq!(mapped("datediff", &["end_dt", "start_dt"]), "DATEDIFF(DAY, start_dt, end_dt)");
        assert_eq!(mapped("date_sub", &["d", "7"]), "DATEADD(DAY, -7, d)");
        assert_eq!(mapped("date_sub", &["d", "n + 1"]), "DATEADD(DAY, -(n + 1), d)");
        assert_eq!(mapped("year", &["ts"]), "DATE_PART(YEAR, ts)");
        assert_eq!(
            mapped("get_json_object", &["payload", "'$.user.id'"]),
            "GET_PATH(PARSE_JSON(payload), 'user.id')"
        );
        assert_eq!(
            mapped("concat_ws", &["'-'", "a", "b"]),
            "ARRAY_TO_STRING(ARRAY_CONSTRUCT(a, b), '-')"
        );
        assert_eq!(
            mapped("percentile", &["latency", "0.95"]),
            "PERCENTILE_CONT(0.95) WITHIN GROUP (ORDER BY latency)"
        );
        assert_eq!(mapped("instr", &["s", "'x'"]), "CHARINDEX('x', s)");
        assert_eq!(
            mapped("unix_timestamp", &[]),
            "DATE_PART(EPOCH_SECOND, CURRENT_TIMESTAMP())"
        );
    }

    #[test]
    fn test_argument_mismatch() {
        let mapper = FunctionMapper::new();
        assert_eq!(
            mapper.apply("datediff", &args(&["a"])),
            CallMapping::ArgumentMismatch
        );
        assert_eq!(
            mapper.apply("get_json_object", &args(&["j", "path_col"])),
            CallMapping::ArgumentMismatch
        );
    }
}
