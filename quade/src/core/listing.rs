//! Human-readable listing of registered fixture functions.

/// Render the `list-fixtures` output for `names`.
///
/// Names are sorted lexicographically. The zero case is a single sentence; the
/// other cases are a header line followed by one `- name` line each. Every
/// line ends with a newline.
pub fn render_fixture_listing<S: AsRef<str>>(names: &[S]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();

    let opening = match sorted.len() {
        0 => return "0 functions are registered with Quade.\n".to_string(),
        1 => "1 function is".to_string(),
        n => format!("{n} functions are"),
    };

    let mut out = format!("{opening} registered with Quade:\n");
    for name in sorted {
        out.push_str("- ");
        out.push_str(name);
        out.push('\n');
    }
    out
}
