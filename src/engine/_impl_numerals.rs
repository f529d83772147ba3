use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use std::str::FromStr;

/// **(internal)** Split an S-expression `(head arg ...)` into its head and the top-level
/// arguments. Returns `None` for atoms.
fn split_list(text: &str) -> Option<(&str, Vec<&str>)> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?.trim();
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => {
                if depth == 0 && start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            ')' => depth = depth.checked_sub(1)?,
            c if c.is_whitespace() && depth == 0 => {
                if let Some(from) = start.take() {
                    items.push(&inner[from..i]);
                }
            }
            _ => {
                if start.is_none() {
                    start = Some(i);
                }
            }
        }
    }
    if let Some(from) = start {
        items.push(&inner[from..]);
    }
    if items.is_empty() {
        return None;
    }
    let head = items.remove(0);
    Some((head, items))
}

/// **(internal)** Decode an integer or real numeral as printed by Z3: `5`, `(- 5)`,
/// `2.5`, `(/ 3.0 2.0)`, or `(- (/ 3.0 2.0))`.
pub(crate) fn parse_rational(text: &str) -> Option<BigRational> {
    let text = text.trim();
    if let Some((head, args)) = split_list(text) {
        return match (head, args.as_slice()) {
            ("-", [value]) => parse_rational(value).map(|it| -it),
            ("/", [numer, denom]) => {
                let denom = parse_rational(denom)?;
                if denom.is_zero() {
                    None
                } else {
                    Some(parse_rational(numer)? / denom)
                }
            }
            _ => None,
        };
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.split_once('.') {
        Some((whole, fraction)) => {
            let scale = num_traits::pow(BigInt::from(10), fraction.len());
            let numer = BigInt::from_str(&format!("{whole}{fraction}")).ok()?;
            BigRational::new(numer, scale)
        }
        None => BigRational::from_integer(BigInt::from_str(digits).ok()?),
    };
    Some(if negative { -value } else { value })
}

/// **(internal)** `true` for the `root-obj` form Z3 uses for irrational algebraic numbers.
pub(crate) fn is_algebraic(text: &str) -> bool {
    matches!(split_list(text.trim()), Some(("root-obj", _)))
}

/// **(internal)** Decode a bit-vector numeral as printed by Z3 (`#b0101`, `#x1f`,
/// or `(_ bv31 8)`) into `width` bits, least significant first.
pub(crate) fn parse_bv(text: &str, width: u32) -> Option<Vec<bool>> {
    let text = text.trim();
    let value = if let Some(bits) = text.strip_prefix("#b") {
        BigInt::parse_bytes(bits.as_bytes(), 2)?
    } else if let Some(hex) = text.strip_prefix("#x") {
        BigInt::parse_bytes(hex.as_bytes(), 16)?
    } else {
        let (head, args) = split_list(text)?;
        match (head, args.as_slice()) {
            ("_", [value, _]) => BigInt::from_str(value.strip_prefix("bv")?).ok()?,
            _ => return None,
        }
    };
    let one = BigInt::one();
    Some(
        (0..width)
            .map(|i| (&value >> i as usize) & &one == one)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(numer: i64, denom: i64) -> BigRational {
        BigRational::new(BigInt::from(numer), BigInt::from(denom))
    }

    #[test]
    fn rational_numerals_are_decoded() {
        assert_eq!(parse_rational("5"), Some(ratio(5, 1)));
        assert_eq!(parse_rational("(- 7)"), Some(ratio(-7, 1)));
        assert_eq!(parse_rational("2.5"), Some(ratio(5, 2)));
        assert_eq!(parse_rational("(/ 3.0 2.0)"), Some(ratio(3, 2)));
        assert_eq!(parse_rational("(- (/ 1.0 3.0))"), Some(ratio(-1, 3)));
        assert_eq!(parse_rational("(/ 1.0 0.0)"), None);
        assert_eq!(parse_rational("x"), None);
        let big = "123456789012345678901234567890";
        assert_eq!(
            parse_rational(big),
            Some(BigRational::from_integer(BigInt::from_str(big).unwrap()))
        );
    }

    #[test]
    fn algebraic_numbers_are_recognized() {
        assert!(is_algebraic("(root-obj (+ (^ x 2) (- 2)) 1)"));
        assert!(!is_algebraic("(/ 3.0 2.0)"));
    }

    #[test]
    fn bitvector_numerals_are_decoded() {
        assert_eq!(parse_bv("#b101", 3), Some(vec![true, false, true]));
        assert_eq!(parse_bv("#x5", 4), Some(vec![true, false, true, false]));
        assert_eq!(parse_bv("(_ bv6 3)", 3), Some(vec![false, true, true]));
        assert_eq!(parse_bv("#b1", 2), Some(vec![true, false]));
        assert_eq!(parse_bv("true", 1), None);
    }
}
