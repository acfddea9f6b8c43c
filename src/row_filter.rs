// A small evaluator for the "where" clauses that can restrict which demand rows are read,
// e.g. "grp = 3 AND qty > 100 OR org = 1001".
use std::cmp::Ordering;

use super::demand_reader::DemandError;


#[derive(PartialEq, Debug, Clone, Copy)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
enum Token {
    Ident(String),
    Number(String),
    Text(String),
    Op(CmpOp),
    And,
    Or,
}

#[derive(PartialEq, Debug, Clone)]
struct Condition {
    column_idx: usize,
    op: CmpOp,
    literal: String,
}

impl Condition {
    fn matches(&self, row: &[&str]) -> bool {
        let value = row.get(self.column_idx).map(|vv| vv.trim()).unwrap_or("");
        let ordering = match (value.parse::<f64>(), self.literal.parse::<f64>()) {
            (Ok(lhs), Ok(rhs)) => match lhs.partial_cmp(&rhs) {
                Some(ord) => ord,
                // NaN never satisfies a comparison
                None => return false,
            },
            _ => value.cmp(self.literal.as_str()),
        };
        self.op.holds(ordering)
    }
}

/// A parsed filter, stored in disjunctive normal form: the row is kept if all conditions of at
/// least one of the clauses hold.
#[derive(PartialEq, Debug, Clone)]
pub struct RowFilter {
    clauses: Vec<Vec<Condition>>,
}

impl RowFilter {
    /// Parses `expression` against the given table header.  Column names are matched without
    /// regard to case.
    pub fn parse(expression: &str, header: &[String]) -> Result<RowFilter, DemandError> {
        let tokens = tokenize(expression)?;
        let mut clauses = vec![];
        let mut current = vec![];
        let mut expect_condition = true;
        let mut idx = 0;
        while idx < tokens.len() {
            if expect_condition {
                let column = match &tokens[idx] {
                    Token::Ident(name) => name,
                    other => return Err(filter_error(expression,
                                                     &format!("unexpected {:?}", other))),
                };
                let column_idx = header.iter().position(|hh| hh.eq_ignore_ascii_case(column))
                    .ok_or_else(|| filter_error(expression,
                                                &format!("unknown column {}", column)))?;
                let op = match tokens.get(idx + 1) {
                    Some(Token::Op(op)) => *op,
                    _ => return Err(filter_error(expression, "missing comparison operator")),
                };
                let literal = match tokens.get(idx + 2) {
                    Some(Token::Number(lit)) | Some(Token::Text(lit)) => lit.clone(),
                    _ => return Err(filter_error(expression, "missing value to compare to")),
                };
                current.push(Condition {column_idx, op, literal});
                idx += 3;
                expect_condition = false;
            } else {
                match tokens[idx] {
                    Token::And => {},
                    Token::Or => clauses.push(std::mem::replace(&mut current, vec![])),
                    ref other => return Err(filter_error(expression,
                                                         &format!("unexpected {:?}", other))),
                }
                idx += 1;
                expect_condition = true;
            }
        }

        if expect_condition {
            // either the expression was empty or it ends with AND / OR
            return Err(filter_error(expression, "incomplete expression"));
        }
        clauses.push(current);
        Ok(RowFilter {clauses})
    }

    pub fn matches(&self, row: &[&str]) -> bool {
        self.clauses.iter().any(|clause| clause.iter().all(|cond| cond.matches(row)))
    }
}

fn filter_error(expression: &str, reason: &str) -> DemandError {
    DemandError::QueryFailed(format!("invalid filter \"{}\": {}", expression, reason))
}

fn tokenize(expression: &str) -> Result<Vec<Token>, DemandError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = vec![];
    let mut ii = 0;
    while ii < chars.len() {
        let cc = chars[ii];
        if cc.is_whitespace() {
            ii += 1;
        } else if cc == '\'' {
            // quoted text, '' stands for a single quote
            let mut text = String::new();
            ii += 1;
            loop {
                match chars.get(ii) {
                    None => return Err(filter_error(expression, "unterminated string")),
                    Some('\'') if chars.get(ii + 1) == Some(&'\'') => {
                        text.push('\'');
                        ii += 2;
                    },
                    Some('\'') => {
                        ii += 1;
                        break;
                    },
                    Some(other) => {
                        text.push(*other);
                        ii += 1;
                    },
                }
            }
            tokens.push(Token::Text(text));
        } else if "=<>!".contains(cc) {
            let next = chars.get(ii + 1).copied();
            let (op, width) = match (cc, next) {
                ('<', Some('=')) => (CmpOp::Le, 2),
                ('>', Some('=')) => (CmpOp::Ge, 2),
                ('<', Some('>')) => (CmpOp::Ne, 2),
                ('!', Some('=')) => (CmpOp::Ne, 2),
                ('=', _) => (CmpOp::Eq, 1),
                ('<', _) => (CmpOp::Lt, 1),
                ('>', _) => (CmpOp::Gt, 1),
                _ => return Err(filter_error(expression, "stray '!'")),
            };
            tokens.push(Token::Op(op));
            ii += width;
        } else if cc.is_ascii_digit() || cc == '-' || cc == '+' || cc == '.' {
            let start = ii;
            ii += 1;
            while ii < chars.len() {
                let in_number = match chars[ii] {
                    dd if dd.is_ascii_alphanumeric() || dd == '.' => true,
                    // exponent sign, as in 1e-3
                    '+' | '-' => chars[ii - 1] == 'e' || chars[ii - 1] == 'E',
                    _ => false,
                };
                if !in_number {
                    break;
                }
                ii += 1;
            }
            let number: String = chars[start..ii].iter().collect();
            if number.parse::<f64>().is_err() {
                return Err(filter_error(expression, &format!("invalid number {}", number)));
            }
            tokens.push(Token::Number(number));
        } else if cc.is_alphabetic() || cc == '_' {
            let start = ii;
            while ii < chars.len() && (chars[ii].is_alphanumeric() || chars[ii] == '_') {
                ii += 1;
            }
            let word: String = chars[start..ii].iter().collect();
            let token = match word.to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                _ => Token::Ident(word),
            };
            tokens.push(token);
        } else {
            return Err(filter_error(expression, &format!("unexpected character '{}'", cc)));
        }
    }
    Ok(tokens)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        vec!["grp", "org", "dst", "qty", "label"].into_iter().map(String::from).collect()
    }

    #[test]
    fn test_simple_comparisons() {
        let row = ["1", "10", "20", "5.5", "coal"];
        let cases = [
            ("grp = 1", true),
            ("grp = 2", false),
            ("qty > 5", true),
            ("qty >= 5.5", true),
            ("qty < 5.5", false),
            ("qty <= 5.5", true),
            ("org <> 10", false),
            ("org != 11", true),
            ("label = 'coal'", true),
            ("LABEL = 'Coal'", false),
            ("dst > -3", true),
        ];
        for (expression, expected) in cases.iter() {
            let filter = RowFilter::parse(expression, &header()).unwrap();
            assert_eq!(filter.matches(&row), *expected, "{}", expression);
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let filter = RowFilter::parse("grp = 0 and qty > 10 OR org = 10", &header()).unwrap();
        assert!(filter.matches(&["0", "1", "2", "11", ""]));
        assert!(!filter.matches(&["0", "1", "2", "9", ""]));
        assert!(filter.matches(&["5", "10", "2", "1", ""]));
        assert!(!filter.matches(&["5", "11", "2", "100", ""]));
    }

    #[test]
    fn test_numeric_rather_than_lexicographic() {
        let filter = RowFilter::parse("qty > 9", &header()).unwrap();
        // lexicographically "10" < "9"
        assert!(filter.matches(&["0", "1", "2", "10", ""]));
    }

    #[test]
    fn test_exponent_numbers() {
        let row = ["1", "10", "20", "0.01", "coal"];
        let cases = [
            ("qty > 1e-3", true),
            ("qty < 2.5E+1", true),
            ("qty > 1E-1", false),
            ("dst = 2e1", true),
            ("org > -1e+2 and qty<1e-1", true),
        ];
        for (expression, expected) in cases.iter() {
            let filter = RowFilter::parse(expression, &header()).unwrap();
            assert_eq!(filter.matches(&row), *expected, "{}", expression);
        }

        // a sign only belongs to the number after an exponent marker
        assert!(RowFilter::parse("qty > 1-3", &header()).is_err());
    }

    #[test]
    fn test_quoted_text() {
        let filter = RowFilter::parse("label = 'it''s'", &header()).unwrap();
        assert!(filter.matches(&["0", "1", "2", "10", "it's"]));
    }

    #[test]
    fn test_invalid_expressions() {
        let bad = ["", "grp", "grp =", "grp = 1 AND", "foo = 1", "grp = 'a", "grp ! 1",
                   "grp = 1 qty = 2", "= 1"];
        for expression in bad.iter() {
            match RowFilter::parse(expression, &header()) {
                Err(DemandError::QueryFailed(msg)) => assert!(msg.contains("invalid filter")),
                other => panic!("{:?} parsed to {:?}", expression, other),
            }
        }
    }
}
