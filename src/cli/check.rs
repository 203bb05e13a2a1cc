//! Scan and parse without compiling

use super::CliError;
use crate::{parse, scan};

/// Parses every statement of `source` and renders its tree back to text.
pub fn execute_check(source: &str) -> Result<Vec<String>, CliError> {
    let mut rendered = Vec::new();
    for tokens in scan(source)? {
        rendered.push(parse(tokens)?.render());
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_each_statement() {
        let rendered = execute_check("a <- (1 + 2) * 3; a").unwrap();
        assert_eq!(rendered.len(), 2);
        assert!(rendered[0].starts_with("a <- "), "{}", rendered[0]);
        assert_eq!(rendered[1], "a");
    }

    #[test]
    fn test_reports_syntax_errors() {
        assert!(matches!(
            execute_check("count(Items"),
            Err(CliError::Compile(_))
        ));
    }
}
