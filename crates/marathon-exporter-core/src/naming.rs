//! Source name normalization.
//!
//! Marathon reports Dropwizard metric names such as
//! `org.eclipse.jetty.ServletContextHandler.2xx-responses`; exposition names
//! may only carry `[a-zA-Z0-9_:]`.

/// Characters replaced with `_` by [`normalize`].
const REPLACED: [char; 5] = ['.', '-', '$', '(', ')'];

/// Map a raw source metric name to an exposition-safe series name.
///
/// Lowercases, replaces `.`, `-`, `$`, `(`, `)` with `_`, then trims trailing
/// underscores. Leading and interior underscores are kept.
pub fn normalize(raw: &str) -> String {
    let name: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if REPLACED.contains(&c) { '_' } else { c })
        .collect();
    name.trim_end_matches('_').to_string()
}

/// Map a Dropwizard rate field (`m1_rate`, `mean_rate`, ...) to a short label value.
pub fn normalize_rate_window(raw: &str) -> String {
    match raw {
        "m1_rate" => "1m".into(),
        "m5_rate" => "5m".into(),
        "m15_rate" => "15m".into(),
        other => other.strip_suffix("_rate").unwrap_or(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_metric() {
        let cases = [
            ("Foo", "foo"),
            ("foo_bar", "foo_bar"),
            ("foo.bar", "foo_bar"),
            ("foo-bar", "foo_bar"),
            ("foo$bar", "foo_bar"),
            ("foo(bar)", "foo_bar"),
            ("foo.bar$baz(1)", "foo_bar_baz_1"),
            ("_foo..bar__", "_foo__bar"),
        ];
        for (raw, expect) in cases {
            assert_eq!(normalize(raw), expect, "raw={raw}");
        }
    }

    #[test]
    fn rename_is_idempotent() {
        let raws = [
            "",
            "___",
            "Foo.Bar",
            "jvm.memory.heap-usage",
            "org.eclipse.jetty.ServletContextHandler.2xx-responses",
            "mesosphere.marathon.api.v2.AppsResource.index(HttpServletRequest)",
            "a$b(c)d-e.f_",
        ];
        for raw in raws {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "raw={raw}");
        }
    }

    #[test]
    fn rename_rate() {
        let cases = [
            ("mean_rate", "mean"),
            ("m1_rate", "1m"),
            ("m5_rate", "5m"),
            ("m15_rate", "15m"),
            ("foo", "foo"),
            ("rate", "rate"),
        ];
        for (raw, expect) in cases {
            assert_eq!(normalize_rate_window(raw), expect, "raw={raw}");
        }
    }
}
