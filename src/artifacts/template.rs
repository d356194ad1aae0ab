//! printf-style template rendering.
//!
//! The schema project's `.sqltemplate` files use `%s` placeholders filled in
//! order, `%[n]s` to pick argument `n` (1-based) and `%%` for a literal `%`.
//! An explicit index also moves the implicit cursor, so `%[2]s %s` renders
//! arguments 2 then 3.

/// Render `template` with `args`.
pub fn render_template(template: &str, args: &[&str]) -> anyhow::Result<String> {
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut next_arg = 0usize;
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some((_, '%')) => out.push('%'),
            Some((_, 's')) => {
                out.push_str(arg_at(args, next_arg, pos)?);
                next_arg += 1;
            }
            Some((_, '[')) => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some((_, ']')) => break,
                        Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                        _ => anyhow::bail!("malformed argument index at byte {}", pos),
                    }
                }
                let index: usize = digits
                    .parse()
                    .map_err(|_| anyhow::anyhow!("malformed argument index at byte {}", pos))?;
                if index == 0 {
                    anyhow::bail!("argument index at byte {} must start at 1", pos);
                }
                match chars.next() {
                    Some((_, 's')) => {}
                    _ => anyhow::bail!("unsupported verb after index at byte {}", pos),
                }
                out.push_str(arg_at(args, index - 1, pos)?);
                next_arg = index;
            }
            Some((_, other)) => anyhow::bail!("unsupported verb '%{}' at byte {}", other, pos),
            None => anyhow::bail!("dangling '%' at end of template"),
        }
    }

    Ok(out)
}

fn arg_at<'a>(args: &[&'a str], index: usize, pos: usize) -> anyhow::Result<&'a str> {
    args.get(index).copied().ok_or_else(|| {
        anyhow::anyhow!(
            "template placeholder at byte {} needs argument {} but only {} given",
            pos,
            index + 1,
            args.len()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_placeholders() {
        let out = render_template("CREATE USER [%s] WITH DEFAULT_SCHEMA=[%s]", &["knight", "dbo"]).unwrap();
        assert_eq!(out, "CREATE USER [knight] WITH DEFAULT_SCHEMA=[dbo]");
    }

    #[test]
    fn test_indexed_placeholders() {
        let out = render_template("USE [%[2]s]\nGO\nCREATE SCHEMA [%[1]s]\n-- %s", &["s", "db", "x"]).unwrap();
        assert_eq!(out, "USE [db]\nGO\nCREATE SCHEMA [s]\n-- db");
    }

    #[test]
    fn test_percent_escape() {
        let out = render_template("SELECT '100%%' -- %s", &["ok"]).unwrap();
        assert_eq!(out, "SELECT '100%' -- ok");
    }

    #[test]
    fn test_missing_argument() {
        let err = render_template("%s %s", &["one"]).unwrap_err();
        assert!(err.to_string().contains("needs argument 2"));
    }

    #[test]
    fn test_unsupported_verb() {
        assert!(render_template("%d", &["1"]).is_err());
        assert!(render_template("100%", &[]).is_err());
        assert!(render_template("%[0]s", &["a"]).is_err());
    }
}
