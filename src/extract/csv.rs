//! CSV row parsing
//!
//! Lines split on `\r?\n`, empty lines dropped, cells split
//! on `,` and trimmed. Quoted fields are not unescaped.

/// Parse CSV text into rows of trimmed cells (pure function)
pub fn parse_csv_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split(',').map(|cell| cell.trim().to_string()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows() {
        let rows = parse_csv_rows("id, value\r\n1, 10\n\n2,20\n");

        assert_eq!(
            rows,
            vec![
                vec!["id".to_string(), "value".to_string()],
                vec!["1".to_string(), "10".to_string()],
                vec!["2".to_string(), "20".to_string()],
            ]
        );
    }

    #[test]
    fn test_single_column_and_empty_cells() {
        let rows = parse_csv_rows("a\n,b,\n");
        assert_eq!(rows[0], vec!["a".to_string()]);
        assert_eq!(rows[1], vec!["".to_string(), "b".to_string(), "".to_string()]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_csv_rows("").is_empty());
        assert!(parse_csv_rows("\n\r\n").is_empty());
    }
}
